//! Shared reference caches: Strategies, Positions, Contracts, Snapshots,
//! TradingDates, ComingDividends.
//!
//! Every cache guards an immutable snapshot behind a `parking_lot::RwLock`
//! and is replaced wholesale on `update`. There is a single fallible `get`
//! per concern rather than the original's `check_updated()` /
//! `_check_updated` (throwing) pair - staleness is folded into the `Result`.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;

use crate::error::CacheError;
use crate::model::{ComingDividend, Contract, Position, QuoteSnapshot, Strategy};

/// Codes used to probe whether the Contracts cache has rolled over to
/// today's session.
pub const CONTRACT_PROBE_CODES: [&str; 4] = ["0050", "00878", "2330", "2317"];

const DEFAULT_TOLERANCE_SECS: i64 = 60;

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub tolerance_secs: i64,
    pub debug: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { tolerance_secs: DEFAULT_TOLERANCE_SECS, debug: false }
    }
}

fn is_fresh(updated_at: DateTime<Utc>, now: DateTime<Utc>, cfg: CacheConfig) -> bool {
    cfg.debug || (now - updated_at).num_seconds() <= cfg.tolerance_secs
}

#[derive(Debug)]
struct Snapshot<T> {
    data: T,
    updated_at: DateTime<Utc>,
}

/// Strategy reference data, indexed by id and by name.
#[derive(Debug)]
pub struct StrategiesCache {
    cfg: CacheConfig,
    inner: RwLock<Option<Snapshot<HashMap<i64, Strategy>>>>,
}

impl StrategiesCache {
    pub fn new(cfg: CacheConfig) -> Self {
        Self { cfg, inner: RwLock::new(None) }
    }

    pub fn update(&self, strategies: Vec<Strategy>, now: DateTime<Utc>) {
        let data = strategies.into_iter().map(|s| (s.id, s)).collect();
        *self.inner.write() = Some(Snapshot { data, updated_at: now });
    }

    pub fn check_updated(&self, now: DateTime<Utc>) -> bool {
        self.inner
            .read()
            .as_ref()
            .is_some_and(|s| is_fresh(s.updated_at, now, self.cfg))
    }

    pub fn get_by_id(&self, id: i64, now: DateTime<Utc>) -> Result<Strategy, CacheError> {
        let guard = self.inner.read();
        let snapshot = guard.as_ref().ok_or(CacheError::Stale { cache: "strategies" })?;
        if !is_fresh(snapshot.updated_at, now, self.cfg) {
            return Err(CacheError::Stale { cache: "strategies" });
        }
        snapshot
            .data
            .get(&id)
            .cloned()
            .ok_or(CacheError::NotFound { cache: "strategies" })
    }

    /// Resolves a strategy name to its id, ignoring freshness - used by the
    /// observer to tag incoming signal-file rows, which should be dropped
    /// on an unknown name regardless of cache staleness.
    pub fn resolve_name(&self, name: &str) -> Option<i64> {
        self.inner
            .read()
            .as_ref()
            .and_then(|s| s.data.values().find(|strategy| strategy.name == name))
            .map(|strategy| strategy.id)
    }
}

/// Open positions, keyed by (strategy_id, code).
#[derive(Debug)]
pub struct PositionsCache {
    cfg: CacheConfig,
    inner: RwLock<Option<Snapshot<HashMap<(i64, String), Position>>>>,
}

impl PositionsCache {
    pub fn new(cfg: CacheConfig) -> Self {
        Self { cfg, inner: RwLock::new(None) }
    }

    pub fn update(&self, positions: Vec<Position>, now: DateTime<Utc>) {
        let data = positions
            .into_iter()
            .map(|p| ((p.strategy_id, p.code.clone()), p))
            .collect();
        *self.inner.write() = Some(Snapshot { data, updated_at: now });
    }

    pub fn check_updated(&self, now: DateTime<Utc>) -> bool {
        self.inner
            .read()
            .as_ref()
            .is_some_and(|s| is_fresh(s.updated_at, now, self.cfg))
    }

    pub fn get(&self, strategy_id: i64, code: &str, now: DateTime<Utc>) -> Result<Position, CacheError> {
        let guard = self.inner.read();
        let snapshot = guard.as_ref().ok_or(CacheError::Stale { cache: "positions" })?;
        if !is_fresh(snapshot.updated_at, now, self.cfg) {
            return Err(CacheError::Stale { cache: "positions" });
        }
        snapshot
            .data
            .get(&(strategy_id, code.to_string()))
            .cloned()
            .ok_or(CacheError::NotFound { cache: "positions" })
    }

    pub fn list_strategy_code(&self) -> Vec<(i64, String)> {
        self.inner
            .read()
            .as_ref()
            .map(|s| s.data.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn codes(&self) -> Vec<String> {
        self.inner
            .read()
            .as_ref()
            .map(|s| s.data.values().map(|p| p.code.clone()).collect())
            .unwrap_or_default()
    }
}

/// Daily contract reference prices, keyed by code.
#[derive(Debug)]
pub struct ContractsCache {
    cfg: CacheConfig,
    inner: RwLock<Option<Snapshot<HashMap<String, Contract>>>>,
}

impl ContractsCache {
    pub fn new(cfg: CacheConfig) -> Self {
        Self { cfg, inner: RwLock::new(None) }
    }

    pub fn update(&self, contracts: Vec<Contract>, now: DateTime<Utc>) {
        let data = contracts.into_iter().map(|c| (c.code.clone(), c)).collect();
        *self.inner.write() = Some(Snapshot { data, updated_at: now });
    }

    /// Fresh iff every probe code present is stamped with today's date.
    pub fn check_updated(&self, today: NaiveDate) -> bool {
        if self.cfg.debug {
            return true;
        }
        let guard = self.inner.read();
        let Some(snapshot) = guard.as_ref() else { return false };
        CONTRACT_PROBE_CODES
            .iter()
            .all(|code| snapshot.data.get(*code).is_some_and(|c| c.update_date == today))
    }

    pub fn get(&self, code: &str, today: NaiveDate) -> Result<Contract, CacheError> {
        let guard = self.inner.read();
        let snapshot = guard.as_ref().ok_or(CacheError::Stale { cache: "contracts" })?;
        let contract = snapshot
            .data
            .get(code)
            .cloned()
            .ok_or(CacheError::NotFound { cache: "contracts" })?;
        if !self.cfg.debug && contract.update_date != today {
            return Err(CacheError::Stale { cache: "contracts" });
        }
        Ok(contract)
    }
}

/// Latest quote tick per code.
#[derive(Debug)]
pub struct SnapshotsCache {
    cfg: CacheConfig,
    inner: RwLock<HashMap<String, QuoteSnapshot>>,
    updated_at: RwLock<Option<DateTime<Utc>>>,
}

impl SnapshotsCache {
    pub fn new(cfg: CacheConfig) -> Self {
        Self { cfg, inner: RwLock::new(HashMap::new()), updated_at: RwLock::new(None) }
    }

    pub fn update_one(&self, code: impl Into<String>, snapshot: QuoteSnapshot, now: DateTime<Utc>) {
        self.inner.write().insert(code.into(), snapshot);
        *self.updated_at.write() = Some(now);
    }

    pub fn check_updated(&self, now: DateTime<Utc>) -> bool {
        self.updated_at
            .read()
            .is_some_and(|updated_at| is_fresh(updated_at, now, self.cfg))
    }

    /// Fails stale if the quote's own timestamp has outlived
    /// `quote_delay_tolerance`, independent of the cache-level tolerance.
    pub fn get(
        &self,
        code: &str,
        now: DateTime<Utc>,
        quote_delay_tolerance_secs: i64,
    ) -> Result<QuoteSnapshot, CacheError> {
        let snapshot = self
            .inner
            .read()
            .get(code)
            .copied()
            .ok_or(CacheError::NotFound { cache: "snapshots" })?;
        if !self.cfg.debug && (now - snapshot.timestamp).num_seconds() > quote_delay_tolerance_secs {
            return Err(CacheError::Stale { cache: "snapshots" });
        }
        Ok(snapshot)
    }
}

/// Ordered trading-date calendar.
#[derive(Debug)]
pub struct TradingDatesCache {
    cfg: CacheConfig,
    inner: RwLock<Option<Snapshot<Vec<NaiveDate>>>>,
}

impl TradingDatesCache {
    pub fn new(cfg: CacheConfig) -> Self {
        Self { cfg, inner: RwLock::new(None) }
    }

    pub fn update(&self, mut dates: Vec<NaiveDate>, now: DateTime<Utc>) {
        dates.sort_unstable();
        *self.inner.write() = Some(Snapshot { data: dates, updated_at: now });
    }

    pub fn check_updated(&self, today: NaiveDate) -> bool {
        if self.cfg.debug {
            return true;
        }
        self.inner.read().as_ref().is_some_and(|s| s.updated_at.date_naive() == today)
    }

    /// The trading date `n` positions after `base`, inclusive counting from
    /// the first date strictly after `base` found in the calendar.
    pub fn next_n(&self, base: NaiveDate, n: i64) -> Result<NaiveDate, CacheError> {
        let guard = self.inner.read();
        let snapshot = guard.as_ref().ok_or(CacheError::Stale { cache: "trading_dates" })?;
        let start = snapshot.data.iter().position(|d| *d > base).ok_or(CacheError::NotFound {
            cache: "trading_dates",
        })?;
        let idx = start + (n.max(1) as usize - 1);
        snapshot
            .data
            .get(idx)
            .copied()
            .ok_or(CacheError::NotFound { cache: "trading_dates" })
    }
}

/// Known ex-dividend dates, keyed by code.
#[derive(Debug)]
pub struct ComingDividendsCache {
    cfg: CacheConfig,
    inner: RwLock<Option<Snapshot<HashMap<String, ComingDividend>>>>,
}

impl ComingDividendsCache {
    pub fn new(cfg: CacheConfig) -> Self {
        Self { cfg, inner: RwLock::new(None) }
    }

    pub fn update(&self, dividends: HashMap<String, ComingDividend>, now: DateTime<Utc>) {
        *self.inner.write() = Some(Snapshot { data: dividends, updated_at: now });
    }

    pub fn check_updated(&self, today: NaiveDate) -> bool {
        if self.cfg.debug {
            return true;
        }
        self.inner.read().as_ref().is_some_and(|s| s.updated_at.date_naive() == today)
    }

    pub fn get(&self, code: &str) -> Option<ComingDividend> {
        self.inner.read().as_ref().and_then(|s| s.data.get(code).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 26, 10, 0, 0).unwrap()
    }

    fn strategy(id: i64, name: &str) -> Strategy {
        Strategy {
            id,
            name: name.to_string(),
            status: true,
            leverage_ratio: dec!(1),
            holding_period: None,
            exit_stop_loss: None,
            exit_take_profit: None,
            exit_dp_days: None,
            exit_dp_profit_limit: None,
            exit_pp_ratio: None,
            exit_pp_threshold: None,
            order_low_ratio: dec!(0),
            enable_raise: true,
            enable_dividend: true,
        }
    }

    #[test]
    fn strategies_cache_rejects_stale_reads() {
        let cache = StrategiesCache::new(CacheConfig::default());
        cache.update(vec![strategy(1, "alpha")], now());

        assert!(cache.get_by_id(1, now()).is_ok());
        let later = now() + chrono::Duration::seconds(61);
        assert!(matches!(cache.get_by_id(1, later), Err(CacheError::Stale { .. })));
    }

    #[test]
    fn strategies_cache_resolves_name_regardless_of_staleness() {
        let cache = StrategiesCache::new(CacheConfig::default());
        cache.update(vec![strategy(7, "fallback")], now());
        let later = now() + chrono::Duration::seconds(600);
        assert_eq!(cache.resolve_name("fallback"), Some(7));
        let _ = later;
    }

    #[test]
    fn trading_dates_next_n_skips_base_date() {
        let cache = TradingDatesCache::new(CacheConfig::default());
        let dates = vec![
            NaiveDate::from_ymd_opt(2023, 5, 25).unwrap(),
            NaiveDate::from_ymd_opt(2023, 5, 26).unwrap(),
            NaiveDate::from_ymd_opt(2023, 5, 29).unwrap(),
            NaiveDate::from_ymd_opt(2023, 5, 30).unwrap(),
        ];
        cache.update(dates, now());

        let base = NaiveDate::from_ymd_opt(2023, 5, 25).unwrap();
        assert_eq!(cache.next_n(base, 1).unwrap(), NaiveDate::from_ymd_opt(2023, 5, 26).unwrap());
        assert_eq!(cache.next_n(base, 2).unwrap(), NaiveDate::from_ymd_opt(2023, 5, 29).unwrap());
    }
}
