//! Configuration parsing for the pulse feed.
//!
//! Settings come from an optional JSON file. Every field has a default, so an
//! empty object (or no file at all) yields a working configuration that tracks
//! the four default Binance pairs on Finnhub.
//!
//! # Example config
//!
//! ```json
//! {
//!   "symbols": ["BINANCE:BTCUSDT", "BINANCE:DOGEUSDT"],
//!   "high_precision_symbols": ["BINANCE:DOGEUSDT"],
//!   "output_path": "/var/www/crypto.json",
//!   "fetch_interval_secs": 60,
//!   "news": { "enabled": true, "category": "crypto" },
//!   "stream": { "ping_interval_secs": 20, "pong_timeout_secs": 10 }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::PulseError;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Tracked symbols. Nothing outside this list ever enters the state.
    pub symbols: Vec<String>,

    /// Symbols rendered with 4 decimals instead of 2 (low-price, high-volatility class).
    pub high_precision_symbols: Vec<String>,

    /// Path of the published snapshot file.
    pub output_path: PathBuf,

    /// Seconds between periodic summary cycles in continuous mode.
    pub fetch_interval_secs: u64,

    /// Headline fetch settings.
    pub news: NewsConfig,

    /// Provider endpoints and credentials.
    pub provider: ProviderConfig,

    /// Trade stream keep-alive and reconnect settings.
    pub stream: StreamConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            high_precision_symbols: vec!["BINANCE:DOGEUSDT".into()],
            output_path: PathBuf::from("crypto.json"),
            fetch_interval_secs: 60,
            news: NewsConfig::default(),
            provider: ProviderConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

impl AppConfig {
    /// Interval between periodic summary cycles.
    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs)
    }

    /// Reject configurations the feed cannot run with.
    pub fn validate(&self) -> Result<(), PulseError> {
        if self.symbols.is_empty() {
            return Err(PulseError::Config("symbols must not be empty".into()));
        }
        if self.fetch_interval_secs == 0 {
            return Err(PulseError::Config("fetch_interval_secs must be > 0".into()));
        }
        if self.stream.ping_interval_secs == 0 || self.stream.pong_timeout_secs == 0 {
            return Err(PulseError::Config("stream ping/pong intervals must be > 0".into()));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(PulseError::Config("output_path must not be empty".into()));
        }
        Ok(())
    }
}

/// Headline fetch settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    /// Fetch headlines during each summary cycle.
    pub enabled: bool,
    /// Provider news category (Finnhub: `general`, `forex`, `crypto`, `merger`).
    pub category: String,
    /// Maximum number of headlines kept in the ticker.
    pub max_headlines: usize,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self { enabled: true, category: "crypto".into(), max_headlines: 10 }
    }
}

/// Provider endpoints and credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// REST API base URL.
    pub rest_url: String,
    /// Trade stream WebSocket URL (the token is appended as `?token=`).
    pub ws_url: String,
    /// Per-request timeout for REST calls.
    pub request_timeout_secs: u64,
    /// Environment variable holding the API token.
    pub api_key_env: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            rest_url: "https://finnhub.io/api/v1".into(),
            ws_url: "wss://ws.finnhub.io".into(),
            request_timeout_secs: 10,
            api_key_env: "FINNHUB_API_KEY".into(),
        }
    }
}

impl ProviderConfig {
    /// Read the API token from the configured environment variable.
    ///
    /// Returns `None` when the variable is unset or blank.
    pub fn api_key_from_env(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Trade stream keep-alive and reconnect settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Interval between WebSocket ping frames.
    pub ping_interval_secs: u64,
    /// A connection with no inbound frame this long after a ping is dropped.
    pub pong_timeout_secs: u64,
    /// First reconnect delay; doubles on each consecutive failure.
    pub reconnect_initial_ms: u64,
    /// Upper bound for the reconnect delay.
    pub reconnect_max_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 20,
            pong_timeout_secs: 10,
            reconnect_initial_ms: 100,
            reconnect_max_secs: 30,
        }
    }
}

fn default_symbols() -> Vec<String> {
    ["BINANCE:BTCUSDT", "BINANCE:ETHUSDT", "BINANCE:SOLUSDT", "BINANCE:DOGEUSDT"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Load and parse a JSON config file.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
