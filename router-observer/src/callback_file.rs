//! Parses broker callback CSV files: order, trade, and position rows.

use chrono::{NaiveDate, NaiveTime};
use router_markets::{Action, Order, OrderStatus, OrderType, Position, Trade};
use rust_decimal::Decimal;

use crate::error::LineParseError;

const SECTYPE_STOCK_CN: &str = "現股";

/// Splits a raw CSV row on commas, then glues the `msg` field (index 9,
/// zero-based, in the 11-field order-callback layout) back together if the
/// message itself contained commas and blew the field count past what the
/// fixed-position parser expects. Ported from the original's message
/// reassembly "HOT FIX".
fn repair_glued_message(raw: &str, expected_fields: usize) -> Vec<String> {
    let fields: Vec<&str> = raw.split(',').collect();
    if fields.len() <= expected_fields {
        return fields.into_iter().map(str::to_string).collect();
    }

    // Fields before `msg` and after `msg` are fixed-width; whatever sits
    // between them got split by the message's own commas and needs
    // rejoining.
    let prefix_len = expected_fields - 2; // fields strictly before `msg`
    let suffix_len = 1; // fields strictly after `msg` (the trailing date, [+seqno])
    let glued_msg = fields[prefix_len..fields.len() - suffix_len].join(",");

    let mut repaired: Vec<String> = fields[..prefix_len].iter().map(|s| s.to_string()).collect();
    repaired.push(glued_msg);
    repaired.extend(fields[fields.len() - suffix_len..].iter().map(|s| s.to_string()));
    repaired
}

fn parse_sectype(raw: &str) -> Result<(), LineParseError> {
    if raw == SECTYPE_STOCK_CN {
        Ok(())
    } else {
        Err(LineParseError::BadField { field: "sectype", value: raw.to_string() })
    }
}

fn parse_action(raw: &str) -> Result<Action, LineParseError> {
    match raw {
        "Buy" => Ok(Action::Buy),
        "Sell" => Ok(Action::Sell),
        other => Err(LineParseError::BadField { field: "action", value: other.to_string() }),
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime, LineParseError> {
    NaiveTime::parse_from_str(raw, "%H%M%S")
        .map_err(|_| LineParseError::BadField { field: "time", value: raw.to_string() })
}

fn parse_date(raw: &str) -> Result<NaiveDate, LineParseError> {
    NaiveDate::parse_from_str(raw, "%Y/%m/%d")
        .map_err(|_| LineParseError::BadField { field: "date", value: raw.to_string() })
}

fn parse_decimal(raw: &str, field: &'static str) -> Result<Decimal, LineParseError> {
    raw.parse().map_err(|_| LineParseError::BadField { field, value: raw.to_string() })
}

fn parse_int(raw: &str, field: &'static str) -> Result<i64, LineParseError> {
    raw.parse().map_err(|_| LineParseError::BadField { field, value: raw.to_string() })
}

/// `trader,order_id,SECTYPE_CN,HHMMSS,code,order_type,Buy|Sell,qty,price,msg,YYYY/MM/DD`
/// Empty `msg` -> status `New`; non-empty -> `Failed`. `strategy_id` is
/// assigned later, by the engine's correlation pass, so it is always 0 at
/// parse time - the sentinel-7 fallback belongs to the engine, not here.
pub fn parse_order_line(raw: &str) -> Result<Order, LineParseError> {
    let fields = repair_glued_message(raw, 11);
    if fields.len() != 11 {
        return Err(LineParseError::FieldCount { expected: 11, actual: fields.len(), line: raw.to_string() });
    }

    parse_sectype(&fields[2])?;

    let msg = fields[9].clone();
    let status = if msg.is_empty() { OrderStatus::New } else { OrderStatus::Failed };

    Ok(Order {
        trader_id: fields[0].clone(),
        strategy_id: 0,
        order_id: fields[1].clone(),
        date: parse_date(&fields[10])?,
        time: parse_time(&fields[3])?,
        code: fields[4].clone(),
        action: parse_action(&fields[6])?,
        quantity: parse_int(&fields[7], "quantity")?,
        price: parse_decimal(&fields[8], "price")?,
        order_type: match fields[5].as_str() {
            "ROD" => OrderType::Rod,
            "IOC" => OrderType::Ioc,
            "FOK" => OrderType::Fok,
            other => return Err(LineParseError::BadField { field: "order_type", value: other.to_string() }),
        },
        status,
        msg,
    })
}

/// Same prefix as the order callback, plus a trailing `seqno`.
pub fn parse_trade_line(raw: &str) -> Result<Trade, LineParseError> {
    let fields = repair_glued_message(raw, 12);
    if fields.len() != 12 {
        return Err(LineParseError::FieldCount { expected: 12, actual: fields.len(), line: raw.to_string() });
    }

    parse_sectype(&fields[2])?;

    Ok(Trade {
        trader_id: fields[0].clone(),
        strategy_id: 0,
        order_id: fields[1].clone(),
        seqno: fields[11].clone(),
        date: parse_date(&fields[10])?,
        time: parse_time(&fields[3])?,
        code: fields[4].clone(),
        action: parse_action(&fields[6])?,
        price: parse_decimal(&fields[8], "price")?,
        quantity: parse_int(&fields[7], "quantity")?,
    })
}

/// `trader,HHMMSS,SECTYPE_CN,code,shares,avg_price,closed_pnl,open_pnl,pnl_chg,cum_return`
/// Rows whose first field starts with a NUL byte are skipped - a residue of
/// truncating the file in place rather than rewriting it.
pub fn parse_position_line(raw: &str, strategy_id: i64) -> Result<Option<Position>, LineParseError> {
    if raw.starts_with('\0') {
        return Ok(None);
    }

    let fields: Vec<&str> = raw.split(',').collect();
    if fields.len() != 10 {
        return Err(LineParseError::FieldCount { expected: 10, actual: fields.len(), line: raw.to_string() });
    }

    parse_sectype(fields[2])?;

    let shares = parse_int(fields[4], "shares")?;
    let action = if shares >= 0 { Action::Buy } else { Action::Sell };

    Ok(Some(Position {
        strategy_id,
        code: fields[3].to_string(),
        action,
        quantity: shares.abs(),
        cost_amount: Decimal::ZERO,
        avg_price: parse_decimal(fields[5], "avg_price")?,
        first_entry_date: None,
        high_since_entry: None,
        low_since_entry: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_clean_order_row() {
        let row = "trader1,00001,現股,093000,2330,ROD,Buy,1000,500.5,,2023/05/25";
        let order = parse_order_line(row).unwrap();
        assert_eq!(order.order_id, "00001");
        assert_eq!(order.status, OrderStatus::New);
    }

    #[test]
    fn glues_a_comma_bearing_message_back_together() {
        let row = "trader1,00001,現股,093000,2330,ROD,Buy,1000,500.5,rejected, too many, retries,2023/05/25";
        let order = parse_order_line(row).unwrap();
        assert_eq!(order.msg, "rejected, too many, retries");
        assert_eq!(order.status, OrderStatus::Failed);
    }

    #[test]
    fn parses_a_trade_row() {
        let row = "trader1,00001,現股,093000,2330,ROD,Buy,1000,500.5,,2023/05/25,000000000001";
        let trade = parse_trade_line(row).unwrap();
        assert_eq!(trade.seqno, "000000000001");
    }

    #[test]
    fn skips_nul_prefixed_position_rows() {
        let row = "\u{0}trader1,093000,現股,2330,1000,500.5,0,0,0,0";
        assert_eq!(parse_position_line(row, 1).unwrap(), None);
    }
}
