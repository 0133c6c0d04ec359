//! Tracks which (strategy, code) positions already have an in-flight
//! exit signal, so a flaky quote stream can't fire the same rule twice,
//! and persists that set to disk so a restart doesn't re-fire it either.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use router_integration::id::SignalIdAllocator;
use router_markets::cache::{ContractsCache, PositionsCache, SnapshotsCache, StrategiesCache, TradingDatesCache};
use router_markets::{Action, OrderType, PriceType, Signal, SignalSource};

use crate::error::TraderError;
use crate::exit_rules::evaluate_exit;

/// In-flight exit signals, keyed by strategy id (stringified, matching the
/// checkpoint file's `string -> list of strings` schema) to the codes that
/// already have an exit signal outstanding for that strategy.
#[derive(Debug)]
pub struct ExitHandler {
    path: PathBuf,
    running: HashMap<String, Vec<String>>,
    quote_delay_tolerance_secs: i64,
}

impl ExitHandler {
    pub fn load(path: impl Into<PathBuf>, quote_delay_tolerance_secs: i64) -> Result<Self, TraderError> {
        let path = path.into();
        let running = read_running(&path)?;
        Ok(Self { path, running, quote_delay_tolerance_secs })
    }

    fn is_running(&self, strategy_id: i64, code: &str) -> bool {
        self.running.get(&strategy_id.to_string()).is_some_and(|codes| codes.iter().any(|c| c == code))
    }

    fn mark_running(&mut self, strategy_id: i64, code: &str) {
        self.running.entry(strategy_id.to_string()).or_default().push(code.to_string());
    }

    /// Clears in-flight tracking and truncates the checkpoint file; called
    /// at the engine's twice-daily reset.
    pub fn reset(&mut self) -> Result<(), TraderError> {
        self.running.clear();
        self.persist()
    }

    fn persist(&self) -> Result<(), TraderError> {
        let json = serde_json::to_string_pretty(&self.running).map_err(TraderError::Serde)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| TraderError::Io { path: self.path.display().to_string(), source })?;
        }
        std::fs::write(&self.path, json).map_err(|source| TraderError::Io { path: self.path.display().to_string(), source })
    }

    /// Evaluates every open position without an in-flight exit. `now_utc`
    /// is used for quote freshness; `now_time`/`today` for rule clocks.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate_positions(
        &mut self,
        positions: &PositionsCache,
        strategies: &StrategiesCache,
        contracts: &ContractsCache,
        snapshots: &SnapshotsCache,
        trading_dates: &TradingDatesCache,
        id_allocator: &SignalIdAllocator,
        now_utc: DateTime<Utc>,
        now_time: NaiveTime,
        today: NaiveDate,
        before_market: bool,
    ) -> Result<Vec<Signal>, TraderError> {
        let mut emitted = Vec::new();

        for (strategy_id, code) in positions.list_strategy_code() {
            if self.is_running(strategy_id, &code) {
                continue;
            }

            let Ok(position) = positions.get(strategy_id, &code, now_utc) else { continue };
            let Ok(strategy) = strategies.get_by_id(strategy_id, now_utc) else { continue };
            if !strategy.status {
                continue;
            }
            let Ok(snapshot) = snapshots.get(&code, now_utc, self.quote_delay_tolerance_secs) else { continue };
            if !snapshot.is_tradeable_bar() {
                continue;
            }

            let Some(exit_type) =
                evaluate_exit(&position, &strategy, &snapshot, trading_dates, today, now_time, before_market)
            else {
                continue;
            };

            let Ok(contract) = contracts.get(&code, today) else { continue };
            let action = position.action.inverted();
            let price = match action {
                Action::Sell => contract.limit_down,
                Action::Buy => contract.limit_up,
            };

            let signal = Signal {
                id: id_allocator.next(),
                source: SignalSource::ExitHandler,
                sdate: today,
                stime: now_time,
                strategy_id,
                security_type: position_security_type(),
                action,
                order_type: OrderType::Rod,
                price_type: PriceType::Lmt,
                code: code.clone(),
                quantity: position.quantity,
                price,
                exit_type: Some(exit_type),
            };

            self.mark_running(strategy_id, &code);
            self.persist()?;
            emitted.push(signal);
        }

        Ok(emitted)
    }
}

fn position_security_type() -> router_markets::SecurityType {
    router_markets::SecurityType::Stock
}

fn read_running(path: &Path) -> Result<HashMap<String, Vec<String>>, TraderError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).map_err(TraderError::Serde),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(source) => Err(TraderError::Io { path: path.display().to_string(), source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_signals_round_trip_through_a_checkpoint_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("running_signals.json");

        let mut handler = ExitHandler::load(&path, 60).unwrap();
        handler.mark_running(1, "2330");
        handler.persist().unwrap();

        let reloaded = ExitHandler::load(&path, 60).unwrap();
        assert_eq!(reloaded.running.len(), 1);
        assert!(reloaded.is_running(1, "2330"));
    }

    #[test]
    fn running_signals_checkpoint_is_keyed_by_strategy_id_string() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("running_signals.json");

        let mut handler = ExitHandler::load(&path, 60).unwrap();
        handler.mark_running(1, "2330");
        handler.persist().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(raw["1"], serde_json::json!(["2330"]));
    }

    #[test]
    fn reset_clears_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("running_signals.json");
        let mut handler = ExitHandler::load(&path, 60).unwrap();
        handler.mark_running(1, "2330");
        handler.persist().unwrap();

        handler.reset().unwrap();
        let reloaded = ExitHandler::load(&path, 60).unwrap();
        assert!(reloaded.running.is_empty());
    }
}
