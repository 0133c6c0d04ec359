//! Domain entities shared by every crate downstream of the reference
//! caches. Field shapes follow §3 of the routing-engine design closely
//! enough that a reviewer can check one against the other line by line.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Only `Stock` is produced in practice; the variant is kept open for
/// forward compatibility rather than collapsed to a unit struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityType {
    Stock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Buy,
    Sell,
}

impl Action {
    pub fn inverted(self) -> Self {
        match self {
            Action::Buy => Action::Sell,
            Action::Sell => Action::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Rod,
    Ioc,
    Fok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceType {
    Lmt,
    Mkt,
    Mop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalSource {
    Upstream,
    ExitHandler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitType {
    ExitByOutDate,
    ExitByDaysProfitLimit,
    ExitByTakeProfit,
    ExitByStopLoss,
    ExitByProfitPullback,
}

/// The reason a risk rejection fired, tagged onto the offending [`Signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RmRejectReason {
    StrategyNotFound,
    StrategyInactive,
    InvalidTradeHour,
    ContractOutdated,
    CannotParticipatingDividend,
    DisableRaise,
    InsufficientUnit,
    DailyAmountLimitExceeded,
    StrategyAmountLimitExceeded,
}

/// Outcome of running a [`Signal`] through the risk manager. Replaces the
/// original's in-place `rm_validated`/`rm_reject_reason` mutation with a
/// single tagged decision returned alongside the (possibly adjusted)
/// signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskDecision {
    Validated,
    Rejected(RmRejectReason),
}

impl RiskDecision {
    pub fn is_validated(&self) -> bool {
        matches!(self, RiskDecision::Validated)
    }
}

/// A trading strategy's static configuration, refreshed wholesale from the
/// store on each sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: i64,
    pub name: String,
    pub status: bool,
    pub leverage_ratio: Decimal,
    pub holding_period: Option<i64>,
    pub exit_stop_loss: Option<Decimal>,
    pub exit_take_profit: Option<Decimal>,
    pub exit_dp_days: Option<i64>,
    pub exit_dp_profit_limit: Option<Decimal>,
    pub exit_pp_ratio: Option<Decimal>,
    pub exit_pp_threshold: Option<Decimal>,
    pub order_low_ratio: Decimal,
    pub enable_raise: bool,
    pub enable_dividend: bool,
}

/// A contract's daily reference prices, keyed by code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub code: String,
    pub name: String,
    pub reference: Decimal,
    pub limit_up: Decimal,
    pub limit_down: Decimal,
    pub update_date: NaiveDate,
}

impl Contract {
    /// `limit_down <= reference <= limit_up`.
    pub fn is_consistent(&self) -> bool {
        self.limit_down <= self.reference && self.reference <= self.limit_up
    }
}

/// An open holding for one (strategy, code) pair. Replaced wholesale at
/// each sync from a FIFO position view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub strategy_id: i64,
    pub code: String,
    pub action: Action,
    pub quantity: i64,
    pub cost_amount: Decimal,
    pub avg_price: Decimal,
    pub first_entry_date: Option<NaiveDate>,
    pub high_since_entry: Option<Decimal>,
    pub low_since_entry: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub size: i64,
}

/// A market quote tick. Stale if `now - timestamp > quote_delay_tolerance`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
    pub total_volume: i64,
    pub amount: Decimal,
    pub total_amount: Decimal,
    pub best_bid: BookLevel,
    pub best_ask: BookLevel,
}

impl QuoteSnapshot {
    /// Auction/matching bars carry no incremental trade; the exit handler
    /// skips them.
    pub fn is_tradeable_bar(&self) -> bool {
        self.total_volume > 0 && self.volume > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComingDividend {
    pub ex_date: NaiveDate,
}

/// An instruction to enter or exit a position, emitted by a strategy or by
/// the exit handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub source: SignalSource,
    pub sdate: NaiveDate,
    pub stime: NaiveTime,
    pub strategy_id: i64,
    pub security_type: SecurityType,
    pub action: Action,
    pub order_type: OrderType,
    pub price_type: PriceType,
    pub code: String,
    pub quantity: i64,
    pub price: Decimal,
    pub exit_type: Option<ExitType>,
}

/// A [`Signal`] after decomposition, shaped for the downstream broker log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerOrder {
    pub signal_id: String,
    pub date: NaiveDate,
    pub time: chrono::NaiveDateTime,
    pub strategy_id: i64,
    pub code: String,
    pub security_type: SecurityType,
    pub action: Action,
    pub order_type: OrderType,
    pub quantity: i64,
    pub price: Decimal,
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    Failed,
}

/// The broker's acknowledgement of a [`BrokerOrder`], carrying a real
/// order_id. `strategy_id` is assigned post-correlation; see the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub trader_id: String,
    pub strategy_id: i64,
    pub order_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub code: String,
    pub action: Action,
    pub quantity: i64,
    pub price: Decimal,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub msg: String,
}

/// A fill event against a previously acknowledged [`Order`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trader_id: String,
    pub strategy_id: i64,
    pub order_id: String,
    pub seqno: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub code: String,
    pub action: Action,
    pub price: Decimal,
    pub quantity: i64,
}
