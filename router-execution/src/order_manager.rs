//! Decomposes risk-validated signals into broker orders, appends them to
//! the broker order log, and gates execution on the `system_check`
//! precondition.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Utc};
use router_integration::{adjust_price_for_tick, ScheduleWindows};
use router_markets::cache::{ContractsCache, StrategiesCache, TradingDatesCache};
use router_markets::{Action, BrokerOrder, Contract, SecurityType, Signal, SignalSource, Strategy};
use rust_decimal::Decimal;

use crate::error::ExecutionError;

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", match self { Action::Buy => "Buy", Action::Sell => "Sell" })
    }
}

impl std::fmt::Display for router_markets::OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                router_markets::OrderType::Rod => "ROD",
                router_markets::OrderType::Ioc => "IOC",
                router_markets::OrderType::Fok => "FOK",
            }
        )
    }
}

impl std::fmt::Display for SecurityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", match self { SecurityType::Stock => "Stock" })
    }
}

/// Splits a risk-validated Upstream Buy signal into two broker orders: a
/// ceil-half at the signal's own (leveraged, limit-snapped) price, and a
/// floor-half priced off the strategy's order-low-ratio shade of the
/// contract reference.
pub fn decompose_half_open_half_order_low_ratio(
    signal: &Signal,
    strategy: &Strategy,
    contract: &Contract,
    now: NaiveDateTime,
) -> Result<(BrokerOrder, BrokerOrder), ExecutionError> {
    let half = signal.quantity / 2;
    let first_qty = signal.quantity - half;
    let second_qty = half;

    let shaded = contract.reference * (Decimal::ONE + strategy.order_low_ratio / Decimal::from(100));
    let second_price = adjust_price_for_tick(shaded)?;

    let order1 = BrokerOrder {
        signal_id: signal.id.clone(),
        date: signal.sdate,
        time: now,
        strategy_id: signal.strategy_id,
        code: signal.code.clone(),
        security_type: signal.security_type,
        action: signal.action,
        order_type: signal.order_type,
        quantity: first_qty,
        price: signal.price,
        order_id: None,
    };

    let order2 = BrokerOrder {
        quantity: second_qty,
        price: second_price,
        ..order1.clone()
    };

    Ok((order1, order2))
}

/// A non-Upstream-Buy signal (Sell, or any exit-handler signal) is routed
/// as a single limit order at the signal's own price.
pub fn execute_limit_order(signal: &Signal, now: NaiveDateTime) -> BrokerOrder {
    BrokerOrder {
        signal_id: signal.id.clone(),
        date: signal.sdate,
        time: now,
        strategy_id: signal.strategy_id,
        code: signal.code.clone(),
        security_type: signal.security_type,
        action: signal.action,
        order_type: signal.order_type,
        quantity: signal.quantity,
        price: signal.price,
        order_id: None,
    }
}

/// Decides how to decompose a risk-validated signal and returns the
/// resulting broker order(s).
pub fn decompose_signal(
    signal: &Signal,
    strategy: &Strategy,
    contract: &Contract,
    now: NaiveDateTime,
) -> Result<Vec<BrokerOrder>, ExecutionError> {
    if matches!(signal.source, SignalSource::Upstream) && matches!(signal.action, Action::Buy) {
        let (a, b) = decompose_half_open_half_order_low_ratio(signal, strategy, contract, now)?;
        Ok(vec![a, b])
    } else {
        Ok(vec![execute_limit_order(signal, now)])
    }
}

/// `signal_id,Stock,<epoch_seconds.microseconds>,code,order_type,action,quantity,price`
pub fn format_broker_order_line(order: &BrokerOrder) -> String {
    let epoch = order.time.and_utc().timestamp();
    let micros = order.time.and_utc().timestamp_subsec_micros();
    format!(
        "{},{},{epoch}.{micros:06},{},{},{},{},{}\n",
        order.signal_id, order.security_type, order.code, order.order_type, order.action, order.quantity, order.price,
    )
}

/// Appends `order`'s log line to `<base>/<sf31_orders>/<strategy_name>/{Buy,Sell}.log`.
pub fn append_broker_order(base_dir: &Path, strategy_name: &str, order: &BrokerOrder) -> Result<(), ExecutionError> {
    let filename = match order.action {
        Action::Buy => "Buy.log",
        Action::Sell => "Sell.log",
    };
    let path: PathBuf = base_dir.join(strategy_name).join(filename);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|source| ExecutionError::OrderLogWrite { path: path.display().to_string(), source })?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| ExecutionError::OrderLogWrite { path: path.display().to_string(), source })?;

    file.write_all(format_broker_order_line(order).as_bytes())
        .map_err(|source| ExecutionError::OrderLogWrite { path: path.display().to_string(), source })
}

/// `true` iff the order manager should execute this pass: trade time,
/// trading-date current, contracts current, strategies current.
pub fn system_check(
    schedule: &ScheduleWindows,
    trading_dates: &TradingDatesCache,
    contracts: &ContractsCache,
    strategies: &StrategiesCache,
    now: chrono::DateTime<chrono::FixedOffset>,
) -> bool {
    let now_utc = now.with_timezone(&Utc);
    let today = now.date_naive();

    schedule.is_trade_time(now)
        && trading_dates.check_updated(today)
        && contracts.check_updated(today)
        && strategies.check_updated(now_utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_markets::{OrderType, PriceType};
    use rust_decimal_macros::dec;

    fn strategy() -> Strategy {
        Strategy {
            id: 1,
            name: "alpha".to_string(),
            status: true,
            leverage_ratio: dec!(1),
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
            reference: dec!(44.00),
            limit_up: dec!(48.40),
            limit_down: dec!(39.60),
            update_date: chrono::NaiveDate::from_ymd_opt(2023, 5, 25).unwrap(),
        }
    }

    fn buy_signal() -> Signal {
        Signal {
            id: "001".to_string(),
            source: SignalSource::Upstream,
            sdate: chrono::NaiveDate::from_ymd_opt(2023, 5, 25).unwrap(),
            stime: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            strategy_id: 1,
            security_type: SecurityType::Stock,
            action: Action::Buy,
            order_type: OrderType::Rod,
            price_type: PriceType::Lmt,
            code: "2330".to_string(),
            quantity: 12,
            price: dec!(39.65),
            exit_type: None,
        }
    }

    #[test]
    fn half_open_half_order_low_ratio_matches_the_worked_example() {
        let now = chrono::NaiveDate::from_ymd_opt(2023, 5, 25)
            .unwrap()
            .and_hms_opt(9, 1, 0)
            .unwrap();
        let (order1, order2) = decompose_half_open_half_order_low_ratio(&buy_signal(), &strategy(), &contract(), now).unwrap();

        assert_eq!(order1.quantity, 6);
        assert_eq!(order1.price, dec!(39.65));
        assert_eq!(order2.quantity, 6);
        assert_eq!(order2.price, dec!(42.95));
    }

    #[test]
    fn broker_order_line_matches_the_documented_csv_shape() {
        let now = chrono::NaiveDate::from_ymd_opt(2023, 5, 25)
            .unwrap()
            .and_hms_opt(9, 1, 0)
            .unwrap();
        let order = execute_limit_order(&buy_signal(), now);
        let line = format_broker_order_line(&order);
        assert!(line.starts_with("001,Stock,"));
        assert!(line.contains(",2330,ROD,Buy,12,39.65"));
    }
}
