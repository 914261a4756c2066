//! Per-symbol metric records and the published snapshot.
//!
//! # Wire layout
//!
//! ```json
//! {
//!   "BINANCE:BTCUSDT": {
//!     "raw_volume": 1234.5,
//!     "price": "64000.12000",
//!     "open_24h": "$63000.00",
//!     "prev_close": 62950.1,
//!     "day_range": "L: $62000.00 - H: $64500.00",
//!     "change_24h": "▲ 1.59%",
//!     "volume_24h": "1,234.50"
//!   },
//!   "news_ticker": ["headline", "..."]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Published metrics for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolMetrics {
    /// Cumulative volume: seeded from the first summary, grown by every trade.
    pub raw_volume: f64,
    /// Latest trade or quote price, rendered.
    pub price: String,
    pub open_24h: String,
    pub prev_close: f64,
    pub day_range: String,
    pub change_24h: String,
    /// Rendering of `raw_volume`.
    pub volume_24h: String,
}

/// A summary already rendered for display, ready to merge into the state.
///
/// `volume` is only used to seed `raw_volume` the first time a symbol is seen.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryUpdate {
    pub volume: f64,
    pub price: String,
    pub open_24h: String,
    pub prev_close: f64,
    pub day_range: String,
    pub change_24h: String,
}

/// The whole market state at one instant; the unit of publication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    #[serde(flatten)]
    pub symbols: BTreeMap<String, SymbolMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_ticker: Option<Vec<String>>,
}

impl MarketSnapshot {
    pub fn get(&self, symbol: &str) -> Option<&SymbolMetrics> {
        self.symbols.get(symbol)
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
