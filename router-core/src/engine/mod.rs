//! Ties every subsystem together: reference-data sync, the correlation
//! maps, and the dispatch of observer/exit-handler events into the risk
//! manager and order manager.
//!
//! The full design splits this into four cooperating workers - engine,
//! order manager, exit handler, file-watch poller - talking over
//! `tokio::sync::mpsc` channels in place of the original's raw deques.
//! `Engine` keeps that division of responsibility in its method
//! boundaries (each below is self-contained and independently callable)
//! but drives the synchronous core from one task; `run` wraps it with
//! the channel-fed async loop described in the design notes.

pub mod correlation;

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use router_execution::{decompose_signal, system_check, DataStore, FlushResult, OffsetPair};
use router_execution::{SignalCollector};
use router_integration::{OrderIdAllocator, ScheduleWindows, SignalIdAllocator};
use router_markets::cache::{
    CacheConfig, ComingDividendsCache, ContractsCache, PositionsCache, SnapshotsCache, StrategiesCache, TradingDatesCache,
};
use router_markets::{
    Action, BrokerOrder, Contract, Order, OrderStatus, OrderType, Position, QuoteSnapshot, RmRejectReason, Trade,
};
use router_observer::{Observer, ObserverEvent};
use router_risk::{RiskConfig, RiskManager};
use router_trader::ExitHandler;

use crate::config::RouterConfig;
use crate::error::RouterError;
use correlation::{CorrelationTables, OrderCorrelation, TradeCorrelation};

const TPE_OFFSET_SECONDS: i32 = 8 * 3600;

fn to_local(now: DateTime<Utc>) -> DateTime<FixedOffset> {
    now.with_timezone(&FixedOffset::east_opt(TPE_OFFSET_SECONDS).expect("fixed offset is always valid"))
}

/// What dispatching one [`ObserverEvent`] (or an exit-handler signal)
/// produced, for the caller to act on (write broker order log lines,
/// persist rows, emit metrics).
#[derive(Debug)]
pub enum EngineOutcome {
    BrokerOrders(Vec<BrokerOrder>),
    SignalRejected(RmRejectReason),
    OrderResolved(Order),
    OrderPending,
    TradeResolved(Trade),
    TradePending,
    PositionObserved(Position),
}

/// The six reference caches, owned by the binary's `main` and borrowed
/// by both the engine and the observer (whose strategy-name resolver
/// reads `strategies` independently of the engine's own borrow of it).
#[derive(Debug)]
pub struct ReferenceCaches {
    pub strategies: StrategiesCache,
    pub positions: PositionsCache,
    pub contracts: ContractsCache,
    pub snapshots: SnapshotsCache,
    pub trading_dates: TradingDatesCache,
    pub coming_dividends: ComingDividendsCache,
}

impl ReferenceCaches {
    pub fn new(cfg: CacheConfig) -> Self {
        Self {
            strategies: StrategiesCache::new(cfg),
            positions: PositionsCache::new(cfg),
            contracts: ContractsCache::new(cfg),
            snapshots: SnapshotsCache::new(cfg),
            trading_dates: TradingDatesCache::new(cfg),
            coming_dividends: ComingDividendsCache::new(cfg),
        }
    }
}

/// Drives reference-data sync, the correlation maps, and signal routing
/// over a set of caches owned by the caller. Constructed once by the
/// binary at startup.
pub struct Engine<'a> {
    pub config: RouterConfig,
    data_store: &'a dyn DataStore,
    pub caches: &'a ReferenceCaches,
    risk_config: RiskConfig,
    pub signal_ids: SignalIdAllocator,
    pub order_ids: OrderIdAllocator,
    correlation: CorrelationTables,
    collector: SignalCollector,
    pub schedule: ScheduleWindows,
    /// `(local date, slot)` of the last `RESET_TIME1`/`RESET_TIME2` this
    /// engine has already fired, so a reset doesn't repeat on every tick
    /// once its window is entered.
    last_reset: Option<(NaiveDate, u8)>,
}

impl std::fmt::Debug for Engine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("config", &self.config).finish_non_exhaustive()
    }
}

impl<'a> Engine<'a> {
    pub fn new(config: RouterConfig, data_store: &'a dyn DataStore, caches: &'a ReferenceCaches) -> Self {
        let risk_config = RiskConfig {
            daily_amount_limit: config.daily_amount_limit,
            strategy_amount_limit: config.strategy_amount_limit,
            debug: config.debug,
        };
        let schedule = ScheduleWindows {
            market_open: config.engine.trade_start_time,
            market_close: config.engine.trade_end_time,
            sync_interval_secs: config.engine.sync_interval_secs,
            snapshot_interval_secs: config.engine.snapshot_interval_secs,
            debug: config.debug,
            ..ScheduleWindows::default()
        };

        Self {
            config,
            data_store,
            caches,
            risk_config,
            signal_ids: SignalIdAllocator::new(),
            order_ids: OrderIdAllocator::new(),
            correlation: CorrelationTables::new(),
            collector: SignalCollector::new(),
            schedule,
            last_reset: None,
        }
    }

    fn risk_manager(&self) -> RiskManager<'_> {
        RiskManager {
            strategies: &self.caches.strategies,
            contracts: &self.caches.contracts,
            trading_dates: &self.caches.trading_dates,
            positions: &self.caches.positions,
            coming_dividends: &self.caches.coming_dividends,
            config: self.risk_config,
        }
    }

    /// Refreshes Strategies and Positions every call; refreshes Contracts
    /// only when stale and `today` is a known trading date; refreshes
    /// TradingDates/ComingDividends once per day.
    pub fn sync_reference_data(&self, now: DateTime<Utc>, today: NaiveDate) -> Result<(), RouterError> {
        self.caches.strategies.update(self.data_store.load_strategies()?, now);
        self.caches.positions.update(self.data_store.load_positions()?, now);

        if !self.caches.trading_dates.check_updated(today) {
            self.caches.trading_dates.update(self.data_store.load_trading_dates()?, now);
        }
        if !self.caches.coming_dividends.check_updated(today) {
            self.caches.coming_dividends.update(self.data_store.load_coming_dividends()?.into_iter().collect(), now);
        }
        if !self.caches.contracts.check_updated(today) && self.caches.trading_dates.check_updated(today) {
            self.caches.contracts.update(self.data_store.load_contracts(today)?, now);
        }
        Ok(())
    }

    /// `true` iff the order manager should execute orders this pass.
    pub fn system_check(&self, now: DateTime<Utc>) -> bool {
        system_check(&self.schedule, &self.caches.trading_dates, &self.caches.contracts, &self.caches.strategies, to_local(now))
    }

    /// `true` on the `sync_interval_secs` tick the run loop should call
    /// [`Self::sync_reference_data`] on.
    pub fn is_sync_due(&self, now: DateTime<Utc>) -> bool {
        self.schedule.is_sync_time(to_local(now))
    }

    /// `true` on the `snapshot_interval_secs` tick the run loop should call
    /// [`Self::refresh_snapshots`] on.
    pub fn is_snapshot_due(&self, now: DateTime<Utc>) -> bool {
        self.schedule.is_snapshot_time(to_local(now))
    }

    /// Reloads the latest quote for every code the caches currently hold a
    /// position in, feeding the exit handler's `SnapshotsCache` so its exit
    /// rules see live prices instead of a permanently-empty cache.
    pub fn refresh_snapshots(&self, now: DateTime<Utc>) -> Result<(), RouterError> {
        let mut codes = self.caches.positions.codes();
        codes.sort_unstable();
        codes.dedup();
        if codes.is_empty() {
            return Ok(());
        }
        let snapshots: Vec<(String, QuoteSnapshot)> = self.data_store.load_snapshots(&codes)?;
        for (code, snapshot) in snapshots {
            self.caches.snapshots.update_one(code, snapshot, now);
        }
        Ok(())
    }

    /// Slot `1` if `now` has crossed `reset_time1` today but not yet been
    /// reset for it, slot `2` likewise for `reset_time2`, else `None`.
    fn due_reset_slot(&self, now: DateTime<Utc>) -> Option<u8> {
        let local = to_local(now);
        let today = local.date_naive();
        let t = local.time();

        let slot = if t >= self.config.engine.reset_time1 && t < self.config.engine.reset_time2 {
            1u8
        } else if t >= self.config.engine.reset_time2 {
            2u8
        } else {
            return None;
        };

        if self.last_reset == Some((today, slot)) {
            None
        } else {
            Some(slot)
        }
    }

    /// Fires [`Self::reset`] once per crossing of `reset_time1`/`reset_time2`,
    /// matching the original's twice-daily reset lifecycle. A no-op outside
    /// those windows or once the day's reset for the current window has
    /// already run.
    pub fn maybe_reset(&mut self, observer: &mut Observer<'_>, exit_handler: &mut ExitHandler, now: DateTime<Utc>) -> Result<bool, RouterError> {
        let Some(slot) = self.due_reset_slot(now) else { return Ok(false) };
        self.reset(observer, exit_handler, now)?;
        self.last_reset = Some((to_local(now).date_naive(), slot));
        Ok(true)
    }

    /// Resets correlation state, the signal collector, the observer and
    /// exit-handler checkpoints, and clears the broker order/signal
    /// directories, then re-syncs reference data, matching the twice-daily
    /// `reset_time1`/`reset_time2` lifecycle.
    pub fn reset(&mut self, observer: &mut Observer<'_>, exit_handler: &mut ExitHandler, now: DateTime<Utc>) -> Result<(), RouterError> {
        self.correlation = CorrelationTables::new();
        self.collector = SignalCollector::new();
        observer.reset_checkpoints()?;
        exit_handler.reset()?;

        let base = std::path::Path::new(&self.config.observer.base_path);
        clear_dir(&base.join(&self.config.observer.xq_signals_dir));
        clear_dir(&base.join(&self.config.observer.sf31_orders_dir));
        truncate_file(&base.join(&self.config.observer.order_callback_dir).join(&self.config.observer.order_callback_file));
        truncate_file(&base.join(&self.config.observer.order_callback_dir).join(&self.config.observer.trade_callback_file));
        truncate_file(&base.join(&self.config.observer.order_callback_dir).join(&self.config.observer.position_callback_file));

        self.sync_reference_data(now, now.date_naive())?;
        Ok(())
    }

    /// The signal collector's flush window: 60s before the market opens,
    /// 0s during the session, widened to 5s in debug mode.
    fn offset_interval(&self, now: DateTime<Utc>) -> Duration {
        if self.schedule.debug {
            return Duration::from_secs(5);
        }
        if self.schedule.is_before_market_time(to_local(now)) {
            Duration::from_secs(60)
        } else {
            Duration::from_secs(0)
        }
    }

    /// Records one internal buy/sell offset as a pair of simulated fills
    /// - a matched Order + Trade on each side, priced at the contract's
    /// reference price - persisted straight to the store rather than
    /// routed to the broker.
    fn record_offset_fill(&self, pair: &OffsetPair, contract: &Contract, now: DateTime<Utc>) -> Result<(), RouterError> {
        let date = now.date_naive();
        let time = now.time();

        let mut fill = |strategy_id: i64, action: Action| -> Result<(), RouterError> {
            let order = Order {
                trader_id: "internal".to_string(),
                strategy_id,
                order_id: self.order_ids.next_order_id(),
                date,
                time,
                code: pair.code.clone(),
                action,
                quantity: pair.qty,
                price: contract.reference,
                order_type: OrderType::Rod,
                status: OrderStatus::New,
                msg: "internal offset".to_string(),
            };
            self.data_store.save_order(&order)?;

            let trade = Trade {
                trader_id: "internal".to_string(),
                strategy_id,
                order_id: order.order_id.clone(),
                seqno: self.order_ids.next_seqno(),
                date,
                time,
                code: pair.code.clone(),
                action,
                price: contract.reference,
                quantity: pair.qty,
            };
            self.data_store.save_trade(&trade)?;
            Ok(())
        };

        fill(pair.buy_strategy_id, Action::Buy)?;
        fill(pair.sell_strategy_id, Action::Sell)?;
        Ok(())
    }

    /// Runs a risk-validated signal through the signal collector and, for
    /// whatever codes flush this pass, decomposes released remainders
    /// into broker orders and records offset pairs as simulated fills.
    fn route_signal(&mut self, signal: router_markets::Signal, now: DateTime<Utc>, today: NaiveDate) -> Result<EngineOutcome, RouterError> {
        let (signal, decision) = self.risk_manager().validate(signal, now, today);
        if let router_markets::RiskDecision::Rejected(reason) = decision {
            return Ok(EngineOutcome::SignalRejected(reason));
        }

        self.collector.push(signal, now);
        let offset_interval = self.offset_interval(now);
        let max_hold = Duration::from_secs(self.config.engine.max_hold_interval_secs);

        let mut broker_orders = Vec::new();
        let flushed: Vec<(String, FlushResult)> = self.collector.check_signals(now, offset_interval, max_hold);
        for (code, flush) in flushed {
            if let Ok(contract) = self.caches.contracts.get(&code, today) {
                for pair in &flush.offset_pairs {
                    self.record_offset_fill(pair, &contract, now)?;
                }
            }

            for released in flush.remainder {
                let Ok(strategy) = self.caches.strategies.get_by_id(released.strategy_id, now) else { continue };
                let Ok(contract) = self.caches.contracts.get(&released.code, today) else { continue };
                broker_orders.extend(decompose_signal(&released, &strategy, &contract, now.naive_utc())?);
            }
        }
        Ok(EngineOutcome::BrokerOrders(broker_orders))
    }

    /// Dispatches one event drained from the observer's output queue.
    pub fn handle_observer_event(&mut self, event: ObserverEvent, now: DateTime<Utc>, today: NaiveDate) -> Result<EngineOutcome, RouterError> {
        match event {
            ObserverEvent::Signal(signal) => self.route_signal(signal, now, today),
            ObserverEvent::Order(order) => match self.correlation.ingest_order_callback(order) {
                OrderCorrelation::Matched { order, broker_order } => {
                    self.data_store.save_order(&order)?;
                    self.data_store.update_sf31_order(&broker_order)?;
                    Ok(EngineOutcome::OrderResolved(order))
                }
                OrderCorrelation::Sentinel(order) => {
                    self.data_store.save_order(&order)?;
                    Ok(EngineOutcome::OrderResolved(order))
                }
                OrderCorrelation::Pending => Ok(EngineOutcome::OrderPending),
            },
            ObserverEvent::Trade(trade) => match self.correlation.ingest_trade_callback(trade) {
                TradeCorrelation::Matched(trade) | TradeCorrelation::Exhausted(trade) => {
                    self.data_store.save_trade(&trade)?;
                    Ok(EngineOutcome::TradeResolved(trade))
                }
                TradeCorrelation::Pending => Ok(EngineOutcome::TradePending),
            },
            ObserverEvent::Position(position) => Ok(EngineOutcome::PositionObserved(position)),
        }
    }

    /// Registers a [`BrokerOrder`] the order manager just sent to the
    /// broker, persisting its SF31 row and tracking it so its eventual
    /// Order callback can be correlated.
    pub fn register_sent_order(&mut self, order: BrokerOrder) -> Result<(), RouterError> {
        self.data_store.save_sf31_order(&order)?;
        self.correlation.register_sent_order(order);
        Ok(())
    }

    /// Retries every pending Order/Trade callback once.
    pub fn drain_retry_queues(&mut self) -> Result<(Vec<Order>, Vec<Trade>), RouterError> {
        let mut orders = Vec::new();
        for c in self
            .correlation
            .drain_pending_order_callbacks(self.config.correlation.order_callback_max_retries, self.config.correlation.sentinel_strategy_id)
        {
            match c {
                OrderCorrelation::Matched { order, broker_order } => {
                    self.data_store.update_sf31_order(&broker_order)?;
                    orders.push(order);
                }
                OrderCorrelation::Sentinel(order) => orders.push(order),
                OrderCorrelation::Pending => unreachable!("drain never yields Pending"),
            }
        }
        for order in &orders {
            self.data_store.save_order(order)?;
        }

        let trades: Vec<Trade> = self
            .correlation
            .drain_pending_trade_callbacks(self.config.correlation.trade_callback_max_retries)
            .into_iter()
            .map(|c| match c {
                TradeCorrelation::Matched(t) | TradeCorrelation::Exhausted(t) => t,
                TradeCorrelation::Pending => unreachable!("drain never yields Pending"),
            })
            .collect();
        for trade in &trades {
            self.data_store.save_trade(trade)?;
        }

        Ok((orders, trades))
    }
}

fn clear_dir(path: &std::path::Path) {
    let Ok(dir) = std::fs::read_dir(path) else { return };
    for entry in dir.flatten() {
        let _ = std::fs::remove_file(entry.path());
    }
}

fn truncate_file(path: &std::path::Path) {
    let _ = std::fs::write(path, "");
}
