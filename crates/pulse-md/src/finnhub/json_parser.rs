//! Finnhub JSON message parser.
//!
//! Parses WebSocket messages from the trade stream and the REST quote/news
//! payloads. Stream messages are dispatched on their `type` field:
//!
//! ```json
//! {"type":"trade","data":[{"s":"BINANCE:BTCUSDT","p":7296.89,"t":1575526691134,"v":0.011467}]}
//! {"type":"ping"}
//! {"type":"error","msg":"Subscribing to too many symbols"}
//! ```

use pulse_core::state::is_valid_volume;

use crate::json_util::{f64_or_zero, parse_f64_field};
use crate::provider::{NewsArticle, Quote};

/// One trade execution from a trade batch.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeTick {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
}

/// A decoded stream message.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// A batch of trade executions.
    Trades(Vec<TradeTick>),
    /// Application-level keep-alive from the server.
    Ping,
    /// Error reported by the server (bad subscription, rate limit, ...).
    Error(String),
    /// Any other message type (subscription acks, news pushes, ...).
    Other(String),
}

/// Parse a stream message.
///
/// Returns `None` for text that is not a JSON object with a `type` field.
pub fn parse_message(text: &str) -> Option<StreamMessage> {
    let v: serde_json::Value = serde_json::from_str(text).ok()?;

    let msg_type = v.get("type")?.as_str()?;
    let msg = match msg_type {
        "trade" => StreamMessage::Trades(parse_trades(&v)),
        "ping" => StreamMessage::Ping,
        "error" => StreamMessage::Error(v.get("msg").and_then(|m| m.as_str()).unwrap_or_default().to_string()),
        other => StreamMessage::Other(other.to_string()),
    };
    Some(msg)
}

/// Build the subscribe message for one symbol.
pub fn build_subscribe(symbol: &str) -> String {
    serde_json::json!({
        "type": "subscribe",
        "symbol": symbol,
    })
    .to_string()
}

/// Decode a `/quote` response body.
///
/// Every price field and the percent change must be a finite number; a
/// missing or `null` one rejects the whole quote. Volume is omitted for most
/// instruments and reads as `0.0` when absent.
pub fn parse_quote(body: &[u8]) -> Result<Quote, serde_json::Error> {
    let v: serde_json::Value = serde_json::from_slice(body)?;
    if !v.is_object() {
        return Err(serde::de::Error::custom("quote payload is not an object"));
    }
    Ok(Quote {
        close: required_f64(&v, "c")?,
        open: required_f64(&v, "o")?,
        high: required_f64(&v, "h")?,
        low: required_f64(&v, "l")?,
        prev_close: required_f64(&v, "pc")?,
        percent_change: required_f64(&v, "dp")?,
        volume: f64_or_zero(&v, "v"),
    })
}

/// Decode a `/news` response body. Articles without a headline are dropped.
pub fn parse_news(body: &[u8]) -> Result<Vec<NewsArticle>, serde_json::Error> {
    let v: serde_json::Value = serde_json::from_slice(body)?;
    let items = v.as_array().ok_or_else(|| serde::de::Error::custom("news payload is not an array"))?;

    Ok(items
        .iter()
        .filter_map(|item| Some(NewsArticle { headline: item.get("headline")?.as_str()?.to_string() }))
        .collect())
}

// ---------------------------------------------------------------------------
// Individual parsers
// ---------------------------------------------------------------------------

fn parse_trades(v: &serde_json::Value) -> Vec<TradeTick> {
    let Some(data) = v.get("data").and_then(|d| d.as_array()) else {
        return Vec::new();
    };
    data.iter().filter_map(parse_trade).collect()
}

/// Entries with a negative or non-finite volume, or a non-finite price, are
/// malformed.
fn parse_trade(v: &serde_json::Value) -> Option<TradeTick> {
    let price = parse_f64_field(v, "p").filter(|p| p.is_finite())?;
    let volume = parse_f64_field(v, "v").filter(|&q| is_valid_volume(q))?;
    Some(TradeTick { symbol: v.get("s")?.as_str()?.to_string(), price, volume })
}

fn required_f64(v: &serde_json::Value, key: &str) -> Result<f64, serde_json::Error> {
    parse_f64_field(v, key)
        .filter(|x| x.is_finite())
        .ok_or_else(|| serde::de::Error::custom(format!("missing or non-numeric field `{key}`")))
}
