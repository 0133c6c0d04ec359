//! The five exit rules evaluated against one open position. Buy and Sell
//! positions are handled by the same formulas; `favorable_ratio` mirrors
//! the Sell side so a rising ratio always means "moving in the holder's
//! favor" regardless of which side of the book the position sits on.

use chrono::{NaiveDate, NaiveTime};
use router_markets::cache::TradingDatesCache;
use router_markets::{Action, ExitType, Position, QuoteSnapshot, Strategy};
use rust_decimal::Decimal;

/// TakeProfit and StopLoss only fire inside this window; the other three
/// rules are unrestricted. Not configurable - carried over from the
/// original's hardcoded hour guard.
fn in_profit_rule_window(now: NaiveTime) -> bool {
    let start = NaiveTime::from_hms_opt(9, 0, 0).expect("valid time");
    let end = NaiveTime::from_hms_opt(14, 0, 0).expect("valid time");
    now >= start && now <= end
}

/// `price` measured against `avg`, sign-flipped for a Sell position so a
/// positive result always means the position is in profit.
fn favorable_ratio(price: Decimal, avg: Decimal, action: Action) -> Decimal {
    match action {
        Action::Buy => price / avg - Decimal::ONE,
        Action::Sell => avg / price - Decimal::ONE,
    }
}

/// The most favorable price touched since entry: the high for a Buy, the
/// low for a Sell.
fn extreme_since_entry(position: &Position, snapshot: &QuoteSnapshot) -> Decimal {
    match position.action {
        Action::Buy => {
            let seen = position.high_since_entry.unwrap_or(snapshot.high);
            seen.max(snapshot.high)
        }
        Action::Sell => {
            let seen = position.low_since_entry.unwrap_or(snapshot.low);
            seen.min(snapshot.low)
        }
    }
}

fn out_date(position: &Position, strategy: &Strategy, trading_dates: &TradingDatesCache, today: NaiveDate) -> bool {
    let (Some(holding_period), Some(first_entry_date)) = (strategy.holding_period, position.first_entry_date) else {
        return false;
    };
    trading_dates.next_n(first_entry_date, holding_period).is_ok_and(|due| today >= due)
}

fn days_profit_limit(
    position: &Position,
    strategy: &Strategy,
    snapshot: &QuoteSnapshot,
    trading_dates: &TradingDatesCache,
    today: NaiveDate,
) -> bool {
    let (Some(days), Some(limit), Some(first_entry_date)) =
        (strategy.exit_dp_days, strategy.exit_dp_profit_limit, position.first_entry_date)
    else {
        return false;
    };
    let Ok(due) = trading_dates.next_n(first_entry_date, days) else { return false };
    if today < due {
        return false;
    }
    favorable_ratio(snapshot.close, position.avg_price, position.action) <= limit
}

fn take_profit(position: &Position, strategy: &Strategy, snapshot: &QuoteSnapshot, now: NaiveTime) -> bool {
    let Some(target) = strategy.exit_take_profit else { return false };
    in_profit_rule_window(now) && favorable_ratio(snapshot.close, position.avg_price, position.action) >= target
}

fn stop_loss(position: &Position, strategy: &Strategy, snapshot: &QuoteSnapshot, now: NaiveTime) -> bool {
    let Some(limit) = strategy.exit_stop_loss else { return false };
    in_profit_rule_window(now) && favorable_ratio(snapshot.close, position.avg_price, position.action) <= limit
}

fn profit_pullback(position: &Position, strategy: &Strategy, snapshot: &QuoteSnapshot) -> bool {
    let (Some(ratio), Some(threshold)) = (strategy.exit_pp_ratio, strategy.exit_pp_threshold) else {
        return false;
    };
    let extreme = extreme_since_entry(position, snapshot);
    let max_range = favorable_ratio(extreme, position.avg_price, position.action);
    if max_range < threshold {
        return false;
    }
    let current = favorable_ratio(snapshot.close, position.avg_price, position.action);
    current < Decimal::ZERO || (Decimal::ONE - current / max_range) >= ratio
}

/// Evaluates all five rules in the order the original lists them and
/// returns the first one that fires. `before_market` gates OutDate, which
/// is only evaluated in the pre-market pass.
#[allow(clippy::too_many_arguments)]
pub fn evaluate_exit(
    position: &Position,
    strategy: &Strategy,
    snapshot: &QuoteSnapshot,
    trading_dates: &TradingDatesCache,
    today: NaiveDate,
    now: NaiveTime,
    before_market: bool,
) -> Option<ExitType> {
    if before_market && out_date(position, strategy, trading_dates, today) {
        return Some(ExitType::ExitByOutDate);
    }
    if days_profit_limit(position, strategy, snapshot, trading_dates, today) {
        return Some(ExitType::ExitByDaysProfitLimit);
    }
    if take_profit(position, strategy, snapshot, now) {
        return Some(ExitType::ExitByTakeProfit);
    }
    if stop_loss(position, strategy, snapshot, now) {
        return Some(ExitType::ExitByStopLoss);
    }
    if profit_pullback(position, strategy, snapshot) {
        return Some(ExitType::ExitByProfitPullback);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_markets::BookLevel;
    use rust_decimal_macros::dec;

    fn strategy() -> Strategy {
        Strategy {
            id: 1,
            name: "alpha".to_string(),
            status: true,
            leverage_ratio: dec!(1),
            holding_period: Some(1),
            exit_stop_loss: Some(dec!(-0.05)),
            exit_take_profit: Some(dec!(0.1)),
            exit_dp_days: None,
            exit_dp_profit_limit: None,
            exit_pp_ratio: None,
            exit_pp_threshold: None,
            order_low_ratio: dec!(0),
            enable_raise: true,
            enable_dividend: true,
        }
    }

    fn position(action: Action, avg: Decimal) -> Position {
        Position {
            strategy_id: 1,
            code: "2330".to_string(),
            action,
            quantity: 1000,
            cost_amount: avg * dec!(1000),
            avg_price: avg,
            first_entry_date: Some(NaiveDate::from_ymd_opt(2023, 5, 25).unwrap()),
            high_since_entry: None,
            low_since_entry: None,
        }
    }

    fn snapshot(close: Decimal, high: Decimal, low: Decimal) -> QuoteSnapshot {
        QuoteSnapshot {
            timestamp: chrono::Utc::now(),
            open: close,
            high,
            low,
            close,
            volume: 100,
            total_volume: 1000,
            amount: dec!(0),
            total_amount: dec!(0),
            best_bid: BookLevel { price: close, size: 0 },
            best_ask: BookLevel { price: close, size: 0 },
        }
    }

    #[test]
    fn out_date_fires_only_before_market() {
        let cache = TradingDatesCache::new(Default::default());
        cache.update(
            vec![
                NaiveDate::from_ymd_opt(2023, 5, 25).unwrap(),
                NaiveDate::from_ymd_opt(2023, 5, 26).unwrap(),
            ],
            chrono::Utc::now(),
        );
        let strat = strategy();
        let pos = position(Action::Buy, dec!(40));
        let snap = snapshot(dec!(40), dec!(40), dec!(40));
        let today = NaiveDate::from_ymd_opt(2023, 5, 28).unwrap();

        assert_eq!(
            evaluate_exit(&pos, &strat, &snap, &cache, today, NaiveTime::from_hms_opt(10, 0, 0).unwrap(), true),
            Some(ExitType::ExitByOutDate)
        );
        assert_eq!(
            evaluate_exit(&pos, &strat, &snap, &cache, today, NaiveTime::from_hms_opt(10, 0, 0).unwrap(), false),
            None
        );
    }

    #[test]
    fn take_profit_respects_the_hour_window_and_sell_side_sign() {
        let cache = TradingDatesCache::new(Default::default());
        let strat = strategy();
        let pos = position(Action::Sell, dec!(40));
        let snap = snapshot(dec!(35), dec!(40), dec!(35));
        let today = NaiveDate::from_ymd_opt(2023, 5, 25).unwrap();

        assert_eq!(
            evaluate_exit(&pos, &strat, &snap, &cache, today, NaiveTime::from_hms_opt(10, 0, 0).unwrap(), false),
            Some(ExitType::ExitByTakeProfit)
        );
        assert_eq!(
            evaluate_exit(&pos, &strat, &snap, &cache, today, NaiveTime::from_hms_opt(14, 0, 1).unwrap(), false),
            None
        );
    }
}
