//! The relational store that backs strategies, positions, contracts, and
//! the order/trade audit trail lives outside this workspace. `DataStore`
//! is the seam the engine syncs through; everything downstream only ever
//! sees the in-memory caches in `router_markets`.
//!
//! Mirrors the shape of `DataManager.save()` in the original: one save
//! call per row, one read call per reference table, no batching.

use chrono::NaiveDate;
use router_markets::{BrokerOrder, ComingDividend, Contract, Order, Position, QuoteSnapshot, Strategy, Trade};

#[derive(Debug, thiserror::Error)]
pub enum DataStoreError {
    #[error("data store unavailable: {0}")]
    Unavailable(String),
}

/// Read/write boundary to the out-of-scope relational store.
pub trait DataStore: Send + Sync {
    fn load_strategies(&self) -> Result<Vec<Strategy>, DataStoreError>;
    fn load_positions(&self) -> Result<Vec<Position>, DataStoreError>;
    fn load_contracts(&self, today: NaiveDate) -> Result<Vec<Contract>, DataStoreError>;
    fn load_trading_dates(&self) -> Result<Vec<NaiveDate>, DataStoreError>;
    fn load_coming_dividends(&self) -> Result<Vec<(String, ComingDividend)>, DataStoreError>;
    /// Latest quote per requested code, for the exit handler's snapshot
    /// refresh. Codes with no fresh quote are simply omitted.
    fn load_snapshots(&self, codes: &[String]) -> Result<Vec<(String, QuoteSnapshot)>, DataStoreError>;

    fn save_order(&self, order: &Order) -> Result<(), DataStoreError>;
    fn save_trade(&self, trade: &Trade) -> Result<(), DataStoreError>;
    /// Persists a freshly emitted SF31 broker order row (`order_id` still
    /// `None`).
    fn save_sf31_order(&self, order: &BrokerOrder) -> Result<(), DataStoreError>;
    /// Stamps the broker-assigned `order_id` onto a previously saved SF31
    /// row once its Order callback has been correlated.
    fn update_sf31_order(&self, order: &BrokerOrder) -> Result<(), DataStoreError>;
}

/// In-memory double used by tests and local runs without a real store
/// configured.
#[derive(Debug, Default)]
pub struct InMemoryDataStore {
    strategies: Vec<Strategy>,
    positions: Vec<Position>,
    contracts: Vec<Contract>,
    trading_dates: Vec<NaiveDate>,
    coming_dividends: Vec<(String, ComingDividend)>,
    quotes: std::sync::Mutex<std::collections::HashMap<String, QuoteSnapshot>>,
    pub saved_orders: std::sync::Mutex<Vec<Order>>,
    pub saved_trades: std::sync::Mutex<Vec<Trade>>,
    pub saved_sf31_orders: std::sync::Mutex<Vec<BrokerOrder>>,
}

impl InMemoryDataStore {
    pub fn new(
        strategies: Vec<Strategy>,
        positions: Vec<Position>,
        contracts: Vec<Contract>,
        trading_dates: Vec<NaiveDate>,
        coming_dividends: Vec<(String, ComingDividend)>,
    ) -> Self {
        Self {
            strategies,
            positions,
            contracts,
            trading_dates,
            coming_dividends,
            quotes: std::sync::Mutex::new(std::collections::HashMap::new()),
            saved_orders: std::sync::Mutex::new(Vec::new()),
            saved_trades: std::sync::Mutex::new(Vec::new()),
            saved_sf31_orders: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Seeds a quote for `load_snapshots` to return, for local runs and
    /// tests - stands in for the out-of-scope market-data feed.
    pub fn seed_quote(&self, code: impl Into<String>, snapshot: QuoteSnapshot) {
        self.quotes.lock().unwrap().insert(code.into(), snapshot);
    }
}

impl DataStore for InMemoryDataStore {
    fn load_strategies(&self) -> Result<Vec<Strategy>, DataStoreError> {
        Ok(self.strategies.clone())
    }

    fn load_positions(&self) -> Result<Vec<Position>, DataStoreError> {
        Ok(self.positions.clone())
    }

    fn load_contracts(&self, _today: NaiveDate) -> Result<Vec<Contract>, DataStoreError> {
        Ok(self.contracts.clone())
    }

    fn load_trading_dates(&self) -> Result<Vec<NaiveDate>, DataStoreError> {
        Ok(self.trading_dates.clone())
    }

    fn load_coming_dividends(&self) -> Result<Vec<(String, ComingDividend)>, DataStoreError> {
        Ok(self.coming_dividends.clone())
    }

    fn load_snapshots(&self, codes: &[String]) -> Result<Vec<(String, QuoteSnapshot)>, DataStoreError> {
        let quotes = self.quotes.lock().unwrap();
        Ok(codes.iter().filter_map(|code| quotes.get(code).map(|q| (code.clone(), *q))).collect())
    }

    fn save_order(&self, order: &Order) -> Result<(), DataStoreError> {
        self.saved_orders.lock().unwrap().push(order.clone());
        Ok(())
    }

    fn save_trade(&self, trade: &Trade) -> Result<(), DataStoreError> {
        self.saved_trades.lock().unwrap().push(trade.clone());
        Ok(())
    }

    fn save_sf31_order(&self, order: &BrokerOrder) -> Result<(), DataStoreError> {
        self.saved_sf31_orders.lock().unwrap().push(order.clone());
        Ok(())
    }

    fn update_sf31_order(&self, order: &BrokerOrder) -> Result<(), DataStoreError> {
        let mut saved = self.saved_sf31_orders.lock().unwrap();
        if let Some(existing) = saved.iter_mut().find(|o| o.signal_id == order.signal_id) {
            *existing = order.clone();
        } else {
            saved.push(order.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_markets::{Action, OrderStatus, OrderType};
    use rust_decimal_macros::dec;

    #[test]
    fn in_memory_store_round_trips_saved_orders() {
        let store = InMemoryDataStore::default();
        let order = Order {
            trader_id: "t1".to_string(),
            strategy_id: 1,
            order_id: "00001".to_string(),
            date: NaiveDate::from_ymd_opt(2023, 5, 25).unwrap(),
            time: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            code: "2330".to_string(),
            action: Action::Buy,
            quantity: 6,
            price: dec!(39.65),
            order_type: OrderType::Rod,
            status: OrderStatus::New,
            msg: String::new(),
        };
        store.save_order(&order).unwrap();
        assert_eq!(store.saved_orders.lock().unwrap().len(), 1);
    }

    fn broker_order() -> BrokerOrder {
        BrokerOrder {
            signal_id: "0123456789abcdef".to_string(),
            date: NaiveDate::from_ymd_opt(2023, 5, 25).unwrap(),
            time: NaiveDate::from_ymd_opt(2023, 5, 25).unwrap().and_hms_opt(9, 0, 0).unwrap(),
            strategy_id: 1,
            code: "2330".to_string(),
            security_type: router_markets::SecurityType::Stock,
            action: Action::Buy,
            order_type: OrderType::Rod,
            quantity: 6,
            price: dec!(39.65),
            order_id: None,
        }
    }

    fn quote_snapshot() -> QuoteSnapshot {
        QuoteSnapshot {
            timestamp: chrono::Utc::now(),
            open: dec!(40),
            high: dec!(41),
            low: dec!(39),
            close: dec!(40.5),
            volume: 100,
            total_volume: 1000,
            amount: dec!(4050),
            total_amount: dec!(40500),
            best_bid: router_markets::BookLevel { price: dec!(40.4), size: 10 },
            best_ask: router_markets::BookLevel { price: dec!(40.6), size: 10 },
        }
    }

    #[test]
    fn load_snapshots_returns_only_seeded_codes() {
        let store = InMemoryDataStore::default();
        store.seed_quote("2330", quote_snapshot());

        let loaded = store.load_snapshots(&["2330".to_string(), "2454".to_string()]).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, "2330");
    }

    #[test]
    fn save_then_update_sf31_order_stamps_the_order_id() {
        let store = InMemoryDataStore::default();
        store.save_sf31_order(&broker_order()).unwrap();

        let mut stamped = broker_order();
        stamped.order_id = Some("00001".to_string());
        store.update_sf31_order(&stamped).unwrap();

        let saved = store.saved_sf31_orders.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].order_id.as_deref(), Some("00001"));
    }
}
