//! Provider port: the summary/news capability injected into the fetcher.
//!
//! The feed never constructs a provider client itself; the runner builds one
//! (production: [`FinnhubClient`](crate::finnhub::FinnhubClient)) and hands it
//! over as an `Arc<dyn QuoteProvider>`. Tests use an in-memory mock.

use async_trait::async_trait;
use pulse_core::error::PulseResult;

/// 24h summary statistics for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quote {
    pub close: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub prev_close: f64,
    /// Percent change over the window (`1.5` = +1.5%).
    pub percent_change: f64,
    /// Cumulative traded volume reported by the provider.
    pub volume: f64,
}

/// A news article, reduced to the headline shown in the ticker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewsArticle {
    pub headline: String,
}

/// Summary and headline source.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Human-readable provider name for log lines.
    fn name(&self) -> &str;

    /// Fetch the current 24h summary for `symbol`.
    async fn quote(&self, symbol: &str) -> PulseResult<Quote>;

    /// Fetch the latest general articles in `category`, newest first.
    async fn general_news(&self, category: &str) -> PulseResult<Vec<NewsArticle>>;
}
