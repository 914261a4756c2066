//! Finnhub provider: REST summaries/news and the trade WebSocket.
//!
//! | Operation     | Transport | Endpoint                                |
//! |---------------|-----------|-----------------------------------------|
//! | 24h summary   | REST GET  | `/quote?symbol=<S>`                     |
//! | Headlines     | REST GET  | `/news?category=<C>&minId=0`            |
//! | Trade stream  | WebSocket | `wss://ws.finnhub.io?token=<T>`         |
//!
//! REST calls authenticate with the `X-Finnhub-Token` header; the stream
//! carries the token in its query string.

pub mod json_parser;
pub mod rest;

use std::time::Duration;

use pulse_core::config::StreamConfig;
use pulse_core::ws::{Backoff, KeepAlive, WsConnConfig};

pub use rest::FinnhubClient;

/// Full stream URL for `base` with the token appended, if any.
pub fn stream_url(base: &str, token: Option<&str>) -> String {
    match token {
        Some(t) => {
            let sep = if base.contains('?') { '&' } else { '?' };
            format!("{base}{sep}token={t}")
        }
        None => base.to_string(),
    }
}

/// Connection settings for the trade stream: one subscribe message per
/// tracked symbol, re-sent on every connect.
pub fn build_stream_config(url: String, symbols: &[String], stream: &StreamConfig) -> WsConnConfig {
    WsConnConfig {
        url,
        subscribe_msgs: symbols.iter().map(|s| json_parser::build_subscribe(s)).collect(),
        keep_alive: Some(KeepAlive {
            interval: Duration::from_secs(stream.ping_interval_secs),
            pong_timeout: Duration::from_secs(stream.pong_timeout_secs),
        }),
        backoff: Backoff {
            initial: Duration::from_millis(stream.reconnect_initial_ms),
            max: Duration::from_secs(stream.reconnect_max_secs),
        },
        id: 0,
    }
}
