//! Batches signals by code and periodically offsets opposing buy/sell
//! quantities within a batch before releasing the remainder for real
//! execution.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use router_markets::{Action, Signal};

/// One half of an internal crossing: a buy and a sell signal on the same
/// code, offset against each other rather than routed to the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetPair {
    pub code: String,
    pub qty: i64,
    pub buy_strategy_id: i64,
    pub buy_signal_id: String,
    pub sell_strategy_id: i64,
    pub sell_signal_id: String,
}

/// Result of flushing one code's batch: any offsetting pairs found, plus
/// whatever buy/sell quantity remains (with zero-quantity remainders
/// already dropped) to release for real execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushResult {
    pub offset_pairs: Vec<OffsetPair>,
    pub remainder: Vec<Signal>,
}

struct CodeBatch {
    buys: Vec<Signal>,
    sells: Vec<Signal>,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

/// Batches signals per code and decides when a batch's offset window has
/// elapsed.
///
/// The original flushes a code purely on "no new signal for
/// `offset_interval`", which never fires for a continuously arriving
/// stream. Per the design notes this is supplemented with a `max_hold`
/// timer: a batch is force-flushed once held longer than `max_hold`
/// regardless of how recently a signal arrived.
#[derive(Default)]
pub struct SignalCollector {
    batches: HashMap<String, CodeBatch>,
}

impl std::fmt::Debug for SignalCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalCollector").field("codes_held", &self.batches.len()).finish()
    }
}

impl SignalCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, signal: Signal, now: DateTime<Utc>) {
        let batch = self.batches.entry(signal.code.clone()).or_insert_with(|| CodeBatch {
            buys: Vec::new(),
            sells: Vec::new(),
            first_seen: now,
            last_seen: now,
        });

        batch.last_seen = now;
        match signal.action {
            Action::Buy => batch.buys.push(signal),
            Action::Sell => batch.sells.push(signal),
        }
    }

    /// Flushes every code batch whose offset window has elapsed, removing
    /// it from the collector.
    pub fn check_signals(&mut self, now: DateTime<Utc>, offset_interval: Duration, max_hold: Duration) -> Vec<(String, FlushResult)> {
        let ready: Vec<String> = self
            .batches
            .iter()
            .filter(|(_, batch)| {
                let idle = (now - batch.last_seen).to_std().unwrap_or(Duration::ZERO);
                let held = (now - batch.first_seen).to_std().unwrap_or(Duration::ZERO);
                idle >= offset_interval || held >= max_hold
            })
            .map(|(code, _)| code.clone())
            .collect();

        ready
            .into_iter()
            .map(|code| {
                let batch = self.batches.remove(&code).expect("code was just observed in batches");
                (code, offset_batch(batch))
            })
            .collect()
    }
}

/// Walks sells as the outer loop and buys as the inner loop, matching the
/// original `_offset_signals`: for each (buy, sell) pair the offset
/// quantity is `min(buy.remaining, sell.remaining)`; both are decremented
/// and the inner loop advances to the next buy until the sell is
/// exhausted, at which point the outer loop moves to the next sell.
fn offset_batch(batch: CodeBatch) -> FlushResult {
    let code = batch.buys.first().or(batch.sells.first()).map(|s| s.code.clone()).unwrap_or_default();

    let mut buys: Vec<(Signal, i64)> = batch.buys.into_iter().map(|s| (s.clone(), s.quantity)).collect();
    let mut sells: Vec<(Signal, i64)> = batch.sells.into_iter().map(|s| (s.clone(), s.quantity)).collect();

    let mut offset_pairs = Vec::new();

    for (sell_signal, sell_remaining) in sells.iter_mut() {
        if *sell_remaining == 0 {
            continue;
        }
        for (buy_signal, buy_remaining) in buys.iter_mut() {
            if *sell_remaining == 0 {
                break;
            }
            if *buy_remaining == 0 {
                continue;
            }

            let qty = (*buy_remaining).min(*sell_remaining);
            if qty > 0 {
                offset_pairs.push(OffsetPair {
                    code: code.clone(),
                    qty,
                    buy_strategy_id: buy_signal.strategy_id,
                    buy_signal_id: buy_signal.id.clone(),
                    sell_strategy_id: sell_signal.strategy_id,
                    sell_signal_id: sell_signal.id.clone(),
                });
                *buy_remaining -= qty;
                *sell_remaining -= qty;
            }
        }
    }

    let mut remainder = Vec::new();
    for (mut signal, remaining) in buys {
        if remaining > 0 {
            signal.quantity = remaining;
            remainder.push(signal);
        }
    }
    for (mut signal, remaining) in sells {
        if remaining > 0 {
            signal.quantity = remaining;
            remainder.push(signal);
        }
    }

    FlushResult { offset_pairs, remainder }
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_markets::{OrderType, PriceType, SecurityType, SignalSource};
    use rust_decimal_macros::dec;

    fn signal(id: &str, action: Action, qty: i64) -> Signal {
        Signal {
            id: id.to_string(),
            source: SignalSource::Upstream,
            sdate: chrono::NaiveDate::from_ymd_opt(2023, 5, 25).unwrap(),
            stime: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            strategy_id: 1,
            security_type: SecurityType::Stock,
            action,
            order_type: OrderType::Rod,
            price_type: PriceType::Lmt,
            code: "2330".to_string(),
            quantity: qty,
            price: dec!(500),
            exit_type: None,
        }
    }

    #[test]
    fn equal_counts_fully_offset() {
        let batch = CodeBatch {
            buys: vec![signal("b1", Action::Buy, 4)],
            sells: vec![signal("s1", Action::Sell, 4)],
            first_seen: Utc::now(),
            last_seen: Utc::now(),
        };
        let result = offset_batch(batch);
        assert_eq!(result.offset_pairs.len(), 1);
        assert_eq!(result.offset_pairs[0].qty, 4);
        assert!(result.remainder.is_empty());
    }

    #[test]
    fn unequal_counts_offset_across_multiple_buys() {
        let batch = CodeBatch {
            buys: vec![signal("b1", Action::Buy, 2), signal("b2", Action::Buy, 2)],
            sells: vec![signal("s1", Action::Sell, 4)],
            first_seen: Utc::now(),
            last_seen: Utc::now(),
        };
        let result = offset_batch(batch);
        let qtys: Vec<i64> = result.offset_pairs.iter().map(|p| p.qty).collect();
        assert_eq!(qtys, vec![2, 2]);
        assert!(result.remainder.is_empty());
    }

    #[test]
    fn leftover_quantity_is_released_as_remainder() {
        let batch = CodeBatch {
            buys: vec![signal("b1", Action::Buy, 6)],
            sells: vec![signal("s1", Action::Sell, 4)],
            first_seen: Utc::now(),
            last_seen: Utc::now(),
        };
        let result = offset_batch(batch);
        assert_eq!(result.offset_pairs[0].qty, 4);
        assert_eq!(result.remainder.len(), 1);
        assert_eq!(result.remainder[0].quantity, 2);
        assert_eq!(result.remainder[0].action, Action::Buy);
    }
}
