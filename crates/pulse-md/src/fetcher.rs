//! Periodic 24h summary fetcher.
//!
//! One cycle requests a [`Quote`] for every tracked symbol, renders it for the
//! dashboard and merges it into the [`SharedMarketState`]; optionally it also
//! refreshes the news ticker. Failures are per item: a symbol that fails is
//! skipped, a news fetch that fails leaves the previous ticker in place.
//!
//! The fetcher never publishes; the caller decides when to write the file.

use std::sync::Arc;

use pulse_core::config::NewsConfig;
use pulse_core::format;
use pulse_core::state::SharedMarketState;
use pulse_core::types::{PriceClass, SummaryUpdate};
use tracing::{debug, info, warn};

use crate::provider::{Quote, QuoteProvider};

/// Outcome of one fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// Symbols merged into the state.
    pub updated: usize,
    /// Symbols skipped because their request failed.
    pub failed: usize,
    /// `None` when news is disabled, otherwise whether the ticker was replaced.
    pub news_refreshed: Option<bool>,
}

/// Pulls summaries (and headlines) from a [`QuoteProvider`] into the state.
pub struct QuoteSnapshotFetcher {
    provider: Arc<dyn QuoteProvider>,
    state: Arc<SharedMarketState>,
    news: Option<NewsConfig>,
}

impl QuoteSnapshotFetcher {
    /// `news: None` (or a config with `enabled: false`) skips headlines.
    pub fn new(provider: Arc<dyn QuoteProvider>, state: Arc<SharedMarketState>, news: Option<NewsConfig>) -> Self {
        Self { provider, state, news: news.filter(|n| n.enabled) }
    }

    /// Run one full cycle over every tracked symbol.
    pub async fn run_cycle(&self) -> CycleReport {
        info!("[fetcher] syncing 24h stats from {}", self.provider.name());
        let mut report = CycleReport::default();

        for symbol in self.state.tracked().iter() {
            match self.provider.quote(symbol).await {
                Ok(quote) => {
                    let class = self.state.tracked().price_class(symbol);
                    if self.state.upsert_summary(symbol, summarize(&quote, class)) {
                        debug!("[fetcher] {symbol} close={} dp={}", quote.close, quote.percent_change);
                        report.updated += 1;
                    }
                }
                Err(e) => {
                    warn!(kind = e.kind(), "[fetcher] {symbol} skipped: {e}");
                    report.failed += 1;
                }
            }
        }

        if let Some(ref news) = self.news {
            report.news_refreshed = Some(self.refresh_news(news).await);
        }

        info!(
            "[fetcher] cycle done — updated={} failed={} news={:?}",
            report.updated, report.failed, report.news_refreshed
        );
        report
    }

    async fn refresh_news(&self, news: &NewsConfig) -> bool {
        match self.provider.general_news(&news.category).await {
            Ok(articles) => {
                let headlines: Vec<String> =
                    articles.into_iter().take(news.max_headlines).map(|a| a.headline).collect();
                debug!("[fetcher] {} headlines", headlines.len());
                self.state.replace_news(headlines);
                true
            }
            Err(e) => {
                warn!(kind = e.kind(), "[fetcher] news kept stale: {e}");
                false
            }
        }
    }
}

/// Render a quote at `class` precision.
pub fn summarize(quote: &Quote, class: PriceClass) -> SummaryUpdate {
    SummaryUpdate {
        volume: quote.volume,
        price: format::quote_price(quote.close, class),
        open_24h: format::dollars(quote.open, class),
        prev_close: quote.prev_close,
        day_range: format::day_range(quote.low, quote.high, class),
        change_24h: format::change(quote.percent_change),
    }
}
