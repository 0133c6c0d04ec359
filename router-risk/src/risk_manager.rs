use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use router_markets::cache::{ContractsCache, PositionsCache, StrategiesCache, TradingDatesCache};
use router_markets::{Action, RiskDecision, RmRejectReason, Signal, SignalSource};

use crate::config::RiskConfig;

/// Validates incoming signals against strategy, contract, trading-calendar
/// and dividend-calendar reference data. Stateless aside from the caches it
/// reads: `validate` takes a signal by value and returns the adjusted
/// signal together with the decision, never mutating anything held by the
/// caller (replacing the original's in-place `rm_validated` /
/// `rm_reject_reason` field mutation).
#[derive(Debug)]
pub struct RiskManager<'a> {
    pub strategies: &'a StrategiesCache,
    pub contracts: &'a ContractsCache,
    pub trading_dates: &'a TradingDatesCache,
    pub positions: &'a PositionsCache,
    pub coming_dividends: &'a router_markets::cache::ComingDividendsCache,
    pub config: RiskConfig,
}

impl<'a> RiskManager<'a> {
    pub fn validate(
        &self,
        mut signal: Signal,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> (Signal, RiskDecision) {
        macro_rules! reject {
            ($reason:expr) => {
                return (signal, RiskDecision::Rejected($reason))
            };
        }

        let Ok(strategy) = self.strategies.get_by_id(signal.strategy_id, now) else {
            reject!(RmRejectReason::StrategyNotFound);
        };

        if !strategy.status {
            reject!(RmRejectReason::StrategyInactive);
        }

        let is_weekday = !matches!(today.weekday(), Weekday::Sat | Weekday::Sun);
        if !self.config.debug && !is_weekday {
            reject!(RmRejectReason::InvalidTradeHour);
        }

        let Ok(contract) = self.contracts.get(&signal.code, today) else {
            reject!(RmRejectReason::ContractOutdated);
        };

        // Leverage and limit-price substitution for upstream entries.
        if matches!(signal.source, SignalSource::Upstream) {
            match signal.action {
                Action::Buy => {
                    signal.quantity = apply_leverage(signal.quantity, strategy.leverage_ratio);
                    signal.price = contract.limit_up;
                }
                Action::Sell => {
                    signal.price = contract.limit_down;
                }
            }
        }

        // Dividend guard.
        if matches!(signal.action, Action::Buy) && !strategy.enable_dividend {
            if let Some(holding_period) = strategy.holding_period {
                if let Some(dividend) = self.coming_dividends.get(&signal.code) {
                    if let Ok(next) = self.trading_dates.next_n(today, holding_period) {
                        if next >= dividend.ex_date {
                            reject!(RmRejectReason::CannotParticipatingDividend);
                        }
                    }
                }
            }
        }

        // Disable-raise guard: a strategy that forbids adding to an
        // existing position on this code.
        if matches!(signal.action, Action::Buy)
            && !strategy.enable_raise
            && self.positions.get(signal.strategy_id, &signal.code, now).is_ok()
        {
            reject!(RmRejectReason::DisableRaise);
        }

        if signal.quantity < 1 {
            reject!(RmRejectReason::InsufficientUnit);
        }

        // Amount-limit validators: TODO upstream, left as always-pass stubs
        // that still read the configured caps so a concrete policy has a
        // single seam to fill in.
        if !self.validate_daily_amount_limit(&signal) {
            reject!(RmRejectReason::DailyAmountLimitExceeded);
        }
        if !self.validate_strategy_amount_limit(&signal) {
            reject!(RmRejectReason::StrategyAmountLimitExceeded);
        }

        (signal, RiskDecision::Validated)
    }

    fn validate_daily_amount_limit(&self, _signal: &Signal) -> bool {
        true
    }

    fn validate_strategy_amount_limit(&self, _signal: &Signal) -> bool {
        true
    }
}

/// `floor(quantity * leverage_ratio)`.
fn apply_leverage(quantity: i64, leverage_ratio: rust_decimal::Decimal) -> i64 {
    use rust_decimal::prelude::ToPrimitive;
    (rust_decimal::Decimal::from(quantity) * leverage_ratio)
        .floor()
        .to_i64()
        .unwrap_or(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_markets::cache::CacheConfig;
    use router_markets::{Contract, OrderType, PriceType, SecurityType, Strategy};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 7, 27, 9, 0, 0).unwrap()
    }

    fn today() -> NaiveDate {
        now().date_naive()
    }

    fn base_signal() -> Signal {
        Signal {
            id: "001".to_string(),
            source: SignalSource::Upstream,
            sdate: today(),
            stime: now().time(),
            strategy_id: 1,
            security_type: SecurityType::Stock,
            action: Action::Buy,
            order_type: OrderType::Rod,
            price_type: PriceType::Lmt,
            code: "2330".to_string(),
            quantity: 10,
            price: dec!(500),
            exit_type: None,
        }
    }

    fn strategy() -> Strategy {
        Strategy {
            id: 1,
            name: "alpha".to_string(),
            status: true,
            leverage_ratio: dec!(2),
            holding_period: None,
            exit_stop_loss: None,
            exit_take_profit: None,
            exit_dp_days: None,
            exit_dp_profit_limit: None,
            exit_pp_ratio: None,
            exit_pp_threshold: None,
            order_low_ratio: dec!(-2.35),
            enable_raise: true,
            enable_dividend: true,
        }
    }

    fn contract() -> Contract {
        Contract {
            code: "2330".to_string(),
            name: "TSMC".to_string(),
            reference: dec!(500),
            limit_up: dec!(550),
            limit_down: dec!(450),
            update_date: today(),
        }
    }

    #[test]
    fn upstream_buy_applies_leverage_and_limit_up_price() {
        let strategies = StrategiesCache::new(CacheConfig::default());
        strategies.update(vec![strategy()], now());
        let contracts = ContractsCache::new(CacheConfig::default());
        contracts.update(vec![contract()], now());
        let trading_dates = TradingDatesCache::new(CacheConfig::default());
        let positions = PositionsCache::new(CacheConfig::default());
        let dividends = router_markets::cache::ComingDividendsCache::new(CacheConfig::default());

        let manager = RiskManager {
            strategies: &strategies,
            contracts: &contracts,
            trading_dates: &trading_dates,
            positions: &positions,
            coming_dividends: &dividends,
            config: RiskConfig { debug: true, ..RiskConfig::default() },
        };

        let (signal, decision) = manager.validate(base_signal(), now(), today());
        assert!(decision.is_validated());
        assert_eq!(signal.quantity, 20);
        assert_eq!(signal.price, dec!(550));
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let strategies = StrategiesCache::new(CacheConfig::default());
        let contracts = ContractsCache::new(CacheConfig::default());
        let trading_dates = TradingDatesCache::new(CacheConfig::default());
        let positions = PositionsCache::new(CacheConfig::default());
        let dividends = router_markets::cache::ComingDividendsCache::new(CacheConfig::default());

        let manager = RiskManager {
            strategies: &strategies,
            contracts: &contracts,
            trading_dates: &trading_dates,
            positions: &positions,
            coming_dividends: &dividends,
            config: RiskConfig::default(),
        };

        let (_, decision) = manager.validate(base_signal(), now(), today());
        assert_eq!(decision, RiskDecision::Rejected(RmRejectReason::StrategyNotFound));
    }
}
