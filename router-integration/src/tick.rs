//! B3 tick-size snapping.
//!
//! Every price on the exchange must land on a grid whose spacing narrows as
//! price increases. Ported from `adjust_price_for_tick_unit`: look up the
//! tick unit for the input price, round to the nearest multiple of that unit
//! (half rounds up, not to even), then requantize to 2 decimal places.

use crate::error::IntegrationError;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Returns the tick unit (minimum price increment) applicable at `price`.
fn tick_unit(price: Decimal) -> Decimal {
    if price < dec!(10) {
        dec!(0.01)
    } else if price < dec!(50) {
        dec!(0.05)
    } else if price < dec!(100) {
        dec!(0.1)
    } else if price < dec!(500) {
        dec!(0.5)
    } else if price < dec!(1000) {
        dec!(1)
    } else {
        dec!(5)
    }
}

/// Snaps `price` to the nearest valid tick, rounding half away from zero,
/// then requantizes the result to 2 decimal places.
pub fn adjust_price_for_tick(price: Decimal) -> Result<Decimal, IntegrationError> {
    if price <= Decimal::ZERO {
        return Err(IntegrationError::NonPositivePrice(price));
    }

    let unit = tick_unit(price);
    let ticks = (price / unit).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let snapped = ticks * unit;

    Ok(snapped.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snaps_across_every_tick_band() {
        let cases: &[(Decimal, Decimal)] = &[
            (dec!(5.123), dec!(5.12)),
            (dec!(5.126), dec!(5.13)),
            (dec!(9.999), dec!(10.00)),
            (dec!(25.03), dec!(25.05)),
            (dec!(25.02), dec!(25.00)),
            (dec!(75.04), dec!(75.00)),
            (dec!(75.06), dec!(75.10)),
            (dec!(250.3), dec!(250.50)),
            (dec!(250.2), dec!(250.00)),
            (dec!(750.6), dec!(751.00)),
            (dec!(750.4), dec!(750.00)),
            (dec!(1500.0), dec!(1500.00)),
            (dec!(1502.5), dec!(1505.00)),
        ];

        for (input, expected) in cases {
            assert_eq!(adjust_price_for_tick(*input).unwrap(), *expected, "input={input}");
        }
    }

    #[test]
    fn rejects_non_positive_price() {
        assert!(adjust_price_for_tick(dec!(0)).is_err());
        assert!(adjust_price_for_tick(dec!(-1)).is_err());
    }
}
