// Converts the venue's loosely-typed JSON into typed records.
// Nothing past this module looks at serde_json::Value.
//
// Numeric fields arrive either as JSON numbers or as decimal strings.
// A record with a bad field is dropped on its own; only a payload without
// the expected list/object fails as a whole.

use serde_json::Value;
use tracing::debug;

use crate::engine::book::{OrderLevel, Orderbook};
use crate::engine::types::Side;
use crate::market_data::types::{Market, Trade};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("field `{field}` is not a number: {value}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("{context}: expected {expected}")]
    UnexpectedShape { context: &'static str, expected: &'static str },
}

pub fn parse_f64(value: Option<&Value>, field: &'static str) -> Result<f64, ParseError> {
    let value = value.ok_or(ParseError::MissingField(field))?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(ParseError::InvalidNumber { field, value: value.to_string() }),
    }
}

// Non-empty string; numbers are rendered as text
pub fn parse_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// `{"<key>": [...]}` or a bare list
fn unwrap_list<'a>(payload: &'a Value, key: &'static str) -> Result<&'a [Value], ParseError> {
    match payload.get(key).unwrap_or(payload) {
        Value::Array(items) => Ok(items.as_slice()),
        _ => Err(ParseError::UnexpectedShape { context: key, expected: "a list" }),
    }
}

fn record_dropped(kind: &'static str, error: &ParseError) {
    debug!(kind, error = %error, "Dropping malformed record");
    metrics::counter!("market_pulse_records_dropped_total", "kind" => kind).increment(1);
}

pub fn parse_markets(payload: &Value) -> Result<Vec<Market>, ParseError> {
    let items = unwrap_list(payload, "markets")?;
    let markets = items
        .iter()
        .filter_map(|item| match parse_market(item) {
            Ok(market) => Some(market),
            Err(e) => {
                record_dropped("market", &e);
                None
            }
        })
        .collect();
    Ok(markets)
}

fn parse_market(item: &Value) -> Result<Market, ParseError> {
    if !item.is_object() {
        return Err(ParseError::UnexpectedShape { context: "market", expected: "an object" });
    }
    let market_id = parse_string(item.get("marketId")).ok_or(ParseError::MissingField("marketId"))?;
    Ok(Market {
        market_id,
        base_denom: parse_string(item.get("baseDenom")).unwrap_or_default(),
        quote_denom: parse_string(item.get("quoteDenom")).unwrap_or_default(),
        ticker: parse_string(item.get("ticker")),
    })
}

/// Accepts `{"orderbook": {"buys": [...], "sells": [...]}}` or the inner object.
/// A missing side is treated as empty.
pub fn parse_orderbook(payload: &Value) -> Result<Orderbook, ParseError> {
    let book = payload.get("orderbook").unwrap_or(payload);
    if !book.is_object() {
        return Err(ParseError::UnexpectedShape { context: "orderbook", expected: "an object" });
    }
    let buys = parse_levels(book, Side::Buy)?;
    let sells = parse_levels(book, Side::Sell)?;
    Ok(Orderbook::new(buys, sells))
}

fn parse_levels(book: &Value, side: Side) -> Result<Vec<OrderLevel>, ParseError> {
    let items = match book.get(side.wire_key()) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ParseError::UnexpectedShape { context: side.wire_key(), expected: "a list" }),
    };

    let levels = items
        .iter()
        .filter_map(|item| match parse_level(item) {
            Ok(level) => Some(level),
            Err(e) => {
                record_dropped("level", &e);
                None
            }
        })
        .collect();
    Ok(levels)
}

fn parse_level(item: &Value) -> Result<OrderLevel, ParseError> {
    let price = parse_f64(item.get("price"), "price")?;
    let quantity = parse_f64(item.get("quantity"), "quantity")?;
    Ok(OrderLevel::new(price, quantity))
}

/// Trades for `market_id`; a trade without its own timestamp gets `now_ms`.
pub fn parse_trades(market_id: &str, payload: &Value, now_ms: u64) -> Result<Vec<Trade>, ParseError> {
    let items = unwrap_list(payload, "trades")?;
    let trades = items
        .iter()
        .filter_map(|item| match parse_trade(market_id, item, now_ms) {
            Ok(trade) => Some(trade),
            Err(e) => {
                record_dropped("trade", &e);
                None
            }
        })
        .collect();
    Ok(trades)
}

fn parse_trade(market_id: &str, item: &Value, now_ms: u64) -> Result<Trade, ParseError> {
    // flat {price, quantity} or a nested price level {price: {price, quantity, timestamp}}
    let (price, quantity, level_ts) = match item.get("price") {
        Some(level @ Value::Object(_)) => (level.get("price"), level.get("quantity"), level.get("timestamp")),
        flat => (flat, item.get("quantity"), None),
    };

    let timestamp_ms = parse_u64(item.get("executedAt")).or_else(|| parse_u64(level_ts)).unwrap_or(now_ms);
    let is_buy = item
        .get("tradeDirection")
        .and_then(Value::as_str)
        .is_some_and(|d| d.eq_ignore_ascii_case("buy"));

    Ok(Trade {
        market_id: market_id.to_string(),
        price: parse_f64(price, "price")?,
        quantity: parse_f64(quantity, "quantity")?,
        timestamp_ms,
        is_buy,
    })
}
