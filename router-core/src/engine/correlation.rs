//! The engine's two correlation maps: matching broker Order callbacks back
//! to the BrokerOrder that produced them, and tagging Trade callbacks with
//! the strategy that owns the Order they settle against.
//!
//! Both directions retry on a miss - callbacks can arrive before the
//! broker order log write they correspond to is even flushed - and give
//! up after a bounded number of attempts rather than retry forever.

use std::collections::{HashMap, VecDeque};

use router_markets::{Action, BrokerOrder, Order, OrderStatus, OrderType, Trade};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OrderKey {
    date: chrono::NaiveDate,
    code_hash: u64,
    action: Action,
    quantity: i64,
    price: Decimal,
    order_type: OrderType,
}

impl OrderKey {
    fn of_broker_order(o: &BrokerOrder) -> Self {
        Self {
            date: o.date,
            code_hash: hash_code(&o.code),
            action: o.action,
            quantity: o.quantity,
            price: o.price,
            order_type: o.order_type,
        }
    }

    fn of_order(o: &Order) -> Self {
        Self {
            date: o.date,
            code_hash: hash_code(&o.code),
            action: o.action,
            quantity: o.quantity,
            price: o.price,
            order_type: o.order_type,
        }
    }
}

fn hash_code(code: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = fnv::FnvHasher::default();
    code.hash(&mut hasher);
    hasher.finish()
}

/// Result of feeding one Order callback through correlation.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderCorrelation {
    /// Matched a queued [`BrokerOrder`]; the callback is tagged with its
    /// strategy and the broker order is stamped with its `order_id`, both
    /// ready to persist.
    Matched { order: Order, broker_order: BrokerOrder },
    /// No match yet; requeued for another attempt.
    Pending,
    /// Retries exhausted; persisted with the sentinel strategy.
    Sentinel(Order),
}

/// Result of feeding one Trade callback through correlation.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeCorrelation {
    Matched(Trade),
    Pending,
    Exhausted(Trade),
}

#[derive(Debug, Default)]
pub struct CorrelationTables {
    unhandled_orders: VecDeque<BrokerOrder>,
    pending_order_callbacks: VecDeque<(Order, u32)>,
    order_callbacks: HashMap<String, Order>,
    pending_trade_callbacks: VecDeque<(Trade, u32)>,
    /// Resolved Order callbacks keyed by `(order_date, order_id)`, so a
    /// duplicate callback reproduces the same row instead of falling
    /// through to a second match attempt (or the sentinel strategy).
    resolved_orders: HashMap<(chrono::NaiveDate, String), OrderCorrelation>,
    /// Resolved Trade callbacks keyed by `(order_id, trade_date, seqno)`,
    /// same idempotence guarantee as `resolved_orders`.
    resolved_trades: HashMap<(String, chrono::NaiveDate, String), TradeCorrelation>,
}

impl CorrelationTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks a [`BrokerOrder`] just sent to the broker, awaiting its Order
    /// callback.
    pub fn register_sent_order(&mut self, order: BrokerOrder) {
        self.unhandled_orders.push_back(order);
    }

    /// Attempts to match `order` against `unhandled_orders` FIFO. On a
    /// match the order is tagged with the queued broker order's strategy
    /// and removed from the queue; on a miss it's queued for a retry. A
    /// callback already resolved under `(order.date, order.order_id)`
    /// replays its stored result rather than re-matching.
    pub fn ingest_order_callback(&mut self, mut order: Order) -> OrderCorrelation {
        let key = (order.date, order.order_id.clone());
        if let Some(resolved) = self.resolved_orders.get(&key) {
            return resolved.clone();
        }

        if let Some(matched) = self.try_match_order(&order) {
            order.strategy_id = matched.strategy_id;
            self.order_callbacks.insert(order.order_id.clone(), order.clone());
            let mut broker_order = matched;
            broker_order.order_id = Some(order.order_id.clone());
            let result = OrderCorrelation::Matched { order, broker_order };
            self.resolved_orders.insert(key, result.clone());
            return result;
        }
        self.pending_order_callbacks.push_back((order, 0));
        OrderCorrelation::Pending
    }

    fn try_match_order(&mut self, order: &Order) -> Option<BrokerOrder> {
        let key = OrderKey::of_order(order);
        let pos = self.unhandled_orders.iter().position(|bo| OrderKey::of_broker_order(bo) == key)?;
        self.unhandled_orders.remove(pos)
    }

    /// Retries every pending Order callback once. Callbacks that still
    /// miss are requeued with an incremented retry count unless they've
    /// exhausted `max_retries`, in which case they're persisted under the
    /// sentinel strategy.
    pub fn drain_pending_order_callbacks(&mut self, max_retries: u32, sentinel_strategy_id: i64) -> Vec<OrderCorrelation> {
        let mut results = Vec::new();
        let pending = std::mem::take(&mut self.pending_order_callbacks);

        for (mut order, retries) in pending {
            let key = (order.date, order.order_id.clone());

            if let Some(matched) = self.try_match_order(&order) {
                order.strategy_id = matched.strategy_id;
                self.order_callbacks.insert(order.order_id.clone(), order.clone());
                let mut broker_order = matched;
                broker_order.order_id = Some(order.order_id.clone());
                let result = OrderCorrelation::Matched { order, broker_order };
                self.resolved_orders.insert(key, result.clone());
                results.push(result);
                continue;
            }

            if retries + 1 >= max_retries {
                order.strategy_id = sentinel_strategy_id;
                self.order_callbacks.insert(order.order_id.clone(), order.clone());
                let result = OrderCorrelation::Sentinel(order);
                self.resolved_orders.insert(key, result.clone());
                results.push(result);
            } else {
                self.pending_order_callbacks.push_back((order, retries + 1));
            }
        }

        results
    }

    /// Looks up `trade.order_id` in `order_callbacks` to tag the trade with
    /// its strategy. On a miss it's queued for a retry. A trade already
    /// resolved under `(order_id, trade_date, seqno)` replays its stored
    /// result rather than re-matching.
    pub fn ingest_trade_callback(&mut self, mut trade: Trade) -> TradeCorrelation {
        let key = (trade.order_id.clone(), trade.date, trade.seqno.clone());
        if let Some(resolved) = self.resolved_trades.get(&key) {
            return resolved.clone();
        }

        if let Some(order) = self.order_callbacks.get(&trade.order_id) {
            trade.strategy_id = order.strategy_id;
            let result = TradeCorrelation::Matched(trade);
            self.resolved_trades.insert(key, result.clone());
            return result;
        }
        self.pending_trade_callbacks.push_back((trade, 0));
        TradeCorrelation::Pending
    }

    pub fn drain_pending_trade_callbacks(&mut self, max_retries: u32) -> Vec<TradeCorrelation> {
        let mut results = Vec::new();
        let pending = std::mem::take(&mut self.pending_trade_callbacks);

        for (mut trade, retries) in pending {
            let key = (trade.order_id.clone(), trade.date, trade.seqno.clone());

            if let Some(order) = self.order_callbacks.get(&trade.order_id) {
                trade.strategy_id = order.strategy_id;
                let result = TradeCorrelation::Matched(trade);
                self.resolved_trades.insert(key, result.clone());
                results.push(result);
                continue;
            }

            if retries + 1 >= max_retries {
                let result = TradeCorrelation::Exhausted(trade);
                self.resolved_trades.insert(key, result.clone());
                results.push(result);
            } else {
                self.pending_trade_callbacks.push_back((trade, retries + 1));
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_markets::SecurityType;
    use rust_decimal_macros::dec;

    fn broker_order(strategy_id: i64) -> BrokerOrder {
        BrokerOrder {
            signal_id: "001".to_string(),
            date: chrono::NaiveDate::from_ymd_opt(2023, 5, 25).unwrap(),
            time: chrono::NaiveDate::from_ymd_opt(2023, 5, 25).unwrap().and_hms_opt(9, 0, 0).unwrap(),
            strategy_id,
            code: "2330".to_string(),
            security_type: SecurityType::Stock,
            action: Action::Buy,
            order_type: OrderType::Rod,
            quantity: 6,
            price: dec!(39.65),
            order_id: None,
        }
    }

    fn order_callback() -> Order {
        Order {
            trader_id: "t1".to_string(),
            strategy_id: 0,
            order_id: "00001".to_string(),
            date: chrono::NaiveDate::from_ymd_opt(2023, 5, 25).unwrap(),
            time: chrono::NaiveTime::from_hms_opt(9, 0, 1).unwrap(),
            code: "2330".to_string(),
            action: Action::Buy,
            quantity: 6,
            price: dec!(39.65),
            order_type: OrderType::Rod,
            status: OrderStatus::New,
            msg: String::new(),
        }
    }

    fn trade_callback(order_id: &str) -> Trade {
        Trade {
            trader_id: "t1".to_string(),
            strategy_id: 0,
            order_id: order_id.to_string(),
            seqno: "000000000001".to_string(),
            date: chrono::NaiveDate::from_ymd_opt(2023, 5, 25).unwrap(),
            time: chrono::NaiveTime::from_hms_opt(9, 0, 2).unwrap(),
            code: "2330".to_string(),
            action: Action::Buy,
            price: dec!(39.65),
            quantity: 6,
        }
    }

    #[test]
    fn order_callback_matches_its_queued_broker_order() {
        let mut tables = CorrelationTables::new();
        tables.register_sent_order(broker_order(3));

        match tables.ingest_order_callback(order_callback()) {
            OrderCorrelation::Matched { order, broker_order } => {
                assert_eq!(order.strategy_id, 3);
                assert_eq!(broker_order.order_id.as_deref(), Some("00001"));
            }
            other => panic!("expected Matched, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_order_callback_replays_the_same_result() {
        let mut tables = CorrelationTables::new();
        tables.register_sent_order(broker_order(3));

        let first = tables.ingest_order_callback(order_callback());
        let second = tables.ingest_order_callback(order_callback());
        assert_eq!(first, second);
    }

    #[test]
    fn unmatched_order_callback_falls_back_to_sentinel_after_max_retries() {
        let mut tables = CorrelationTables::new();
        tables.ingest_order_callback(order_callback());

        let mut last = Vec::new();
        for _ in 0..10 {
            last = tables.drain_pending_order_callbacks(10, 7);
            if !last.is_empty() {
                break;
            }
        }

        assert_eq!(last.len(), 1);
        match &last[0] {
            OrderCorrelation::Sentinel(order) => assert_eq!(order.strategy_id, 7),
            other => panic!("expected Sentinel, got {other:?}"),
        }
    }

    #[test]
    fn trade_callback_is_tagged_once_its_order_has_matched() {
        let mut tables = CorrelationTables::new();
        tables.register_sent_order(broker_order(3));
        tables.ingest_order_callback(order_callback());

        match tables.ingest_trade_callback(trade_callback("00001")) {
            TradeCorrelation::Matched(trade) => assert_eq!(trade.strategy_id, 3),
            other => panic!("expected Matched, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_trade_callback_replays_the_same_result() {
        let mut tables = CorrelationTables::new();
        tables.register_sent_order(broker_order(3));
        tables.ingest_order_callback(order_callback());

        let first = tables.ingest_trade_callback(trade_callback("00001"));
        let second = tables.ingest_trade_callback(trade_callback("00001"));
        assert_eq!(first, second);
    }
}
