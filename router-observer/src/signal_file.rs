//! Parses strategy signal log files:
//! `<base>/<xq_signals>/<YYYYMMDD>_<strategy_name>.log`, lines
//! `HHMMSS CODE.EX ORDER_TYPE ACTION QTY PRICE`.

use chrono::{NaiveDate, NaiveTime};
use router_markets::{Action, OrderType, PriceType, SecurityType, Signal, SignalSource};
use rust_decimal::Decimal;

use crate::error::LineParseError;

/// Splits a signal-log filename into its date and embedded strategy name.
pub fn parse_signal_filename(filename: &str) -> Result<(NaiveDate, String), LineParseError> {
    let stem = filename.strip_suffix(".log").unwrap_or(filename);
    let (date_part, name_part) = stem
        .split_once('_')
        .ok_or_else(|| LineParseError::BadFilename(filename.to_string()))?;

    let date = NaiveDate::parse_from_str(date_part, "%Y%m%d")
        .map_err(|_| LineParseError::BadFilename(filename.to_string()))?;

    Ok((date, name_part.to_string()))
}

/// Parses one signal-file line into a [`Signal`], given the strategy id
/// already resolved from the filename's strategy name and the id allocator
/// used to mint the signal's id.
pub fn parse_signal_line(
    line: &str,
    strategy_id: i64,
    sdate: NaiveDate,
    id: String,
) -> Result<Signal, LineParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 6 {
        return Err(LineParseError::FieldCount { expected: 6, actual: fields.len(), line: line.to_string() });
    }
    let (htime, code_ex, order_type, action, qty, price) =
        (fields[0], fields[1], fields[2], fields[3], fields[4], fields[5]);

    let stime = NaiveTime::parse_from_str(htime, "%H%M%S")
        .map_err(|_| LineParseError::BadField { field: "time", value: htime.to_string() })?;

    let code = code_ex
        .split_once('.')
        .map(|(code, _exchange)| code.to_string())
        .unwrap_or_else(|| code_ex.to_string());

    let order_type = match order_type {
        "ROD" => OrderType::Rod,
        "IOC" => OrderType::Ioc,
        "FOK" => OrderType::Fok,
        other => return Err(LineParseError::BadField { field: "order_type", value: other.to_string() }),
    };

    let action = match action {
        "B" => Action::Buy,
        "S" => Action::Sell,
        other => return Err(LineParseError::BadField { field: "action", value: other.to_string() }),
    };

    let quantity: i64 = qty
        .parse()
        .map_err(|_| LineParseError::BadField { field: "quantity", value: qty.to_string() })?;

    let price: Decimal = price
        .parse()
        .map_err(|_| LineParseError::BadField { field: "price", value: price.to_string() })?;

    Ok(Signal {
        id,
        source: SignalSource::Upstream,
        sdate,
        stime,
        strategy_id,
        security_type: SecurityType::Stock,
        action,
        order_type,
        price_type: PriceType::Lmt,
        code,
        quantity,
        price,
        exit_type: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_filename() {
        let (date, name) = parse_signal_filename("20230525_momentum.log").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2023, 5, 25).unwrap());
        assert_eq!(name, "momentum");
    }

    #[test]
    fn parses_a_well_formed_line() {
        let signal =
            parse_signal_line("093000 2330.TW ROD B 1000 500.5", 7, NaiveDate::from_ymd_opt(2023, 5, 25).unwrap(), "001".into())
                .unwrap();
        assert_eq!(signal.code, "2330");
        assert_eq!(signal.action, Action::Buy);
        assert_eq!(signal.quantity, 1000);
        assert_eq!(signal.price, "500.5".parse().unwrap());
    }

    #[test]
    fn rejects_malformed_line() {
        assert!(parse_signal_line("bad line", 7, NaiveDate::from_ymd_opt(2023, 5, 25).unwrap(), "001".into()).is_err());
    }
}
