//! Feed orchestrator.
//!
//! Wires the shared state, publisher, fetcher and trade stream together and
//! runs them in one of two modes:
//!
//! - **one-shot** ([`Feed::run_once`]): one summary cycle, one publish, no
//!   stream connection.
//! - **continuous** ([`Feed::run_continuous`]): an initial cycle, then the
//!   trade stream plus a periodic cycle until shutdown, then a final publish.

use std::sync::Arc;

use pulse_core::config::AppConfig;
use pulse_core::publish::SnapshotPublisher;
use pulse_core::state::SharedMarketState;
use pulse_core::types::TrackedSymbols;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::fetcher::{CycleReport, QuoteSnapshotFetcher};
use crate::finnhub;
use crate::provider::QuoteProvider;
use crate::stream::{StreamStats, TradeStreamConsumer};

/// What a run did, for the final log line and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub cycles: u64,
    /// Last cycle's report.
    pub last_cycle: CycleReport,
    /// Snapshots written over the whole run (stream batches included).
    pub published: u64,
    pub publish_failures: u64,
    /// `None` in one-shot mode.
    pub stream: Option<StreamStats>,
}

/// The assembled feed.
pub struct Feed {
    config: AppConfig,
    api_key: Option<String>,
    state: Arc<SharedMarketState>,
    publisher: Arc<SnapshotPublisher>,
    fetcher: QuoteSnapshotFetcher,
}

impl Feed {
    /// Build the feed around an injected provider.
    ///
    /// `api_key` is only used for the stream URL; the provider carries its
    /// own credentials.
    pub fn new(config: AppConfig, provider: Arc<dyn QuoteProvider>, api_key: Option<String>) -> Self {
        let tracked = TrackedSymbols::new(config.symbols.iter().cloned(), config.high_precision_symbols.iter().cloned());
        let state = Arc::new(SharedMarketState::with_max_headlines(tracked, config.news.max_headlines));
        let publisher = Arc::new(SnapshotPublisher::new(Arc::clone(&state), config.output_path.clone()));
        let fetcher = QuoteSnapshotFetcher::new(provider, Arc::clone(&state), Some(config.news.clone()));

        Self { config, api_key, state, publisher, fetcher }
    }

    pub fn state(&self) -> &Arc<SharedMarketState> {
        &self.state
    }

    pub fn publisher(&self) -> &Arc<SnapshotPublisher> {
        &self.publisher
    }

    /// Fetch once, publish once.
    pub async fn run_once(&self) -> RunSummary {
        info!("[feed] one-shot run for {} symbols", self.state.tracked().len());
        let report = self.fetcher.run_cycle().await;
        self.publisher.publish().await;
        self.summary(1, report, None)
    }

    /// Run until `shutdown` flips to `true`.
    pub async fn run_continuous(self, mut shutdown: watch::Receiver<bool>) -> RunSummary {
        let interval = self.config.fetch_interval();
        info!(
            "[feed] continuous run for {} symbols, refresh every {}s",
            self.state.tracked().len(),
            interval.as_secs()
        );

        // Seed the state before trades start arriving.
        let mut report = self.fetcher.run_cycle().await;
        self.publisher.publish().await;
        let mut cycles = 1;

        let url = finnhub::stream_url(&self.config.provider.ws_url, self.api_key.as_deref());
        let ws_config = finnhub::build_stream_config(url, self.state.tracked().as_slice(), &self.config.stream);
        let consumer = TradeStreamConsumer::new(Arc::clone(&self.state), Arc::clone(&self.publisher), ws_config);
        let (stream_stop_tx, stream_stop_rx) = watch::channel(false);
        let stream_task = tokio::spawn(consumer.run(stream_stop_rx));

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(interval) => {
                    report = self.fetcher.run_cycle().await;
                    self.publisher.publish().await;
                    cycles += 1;
                }
            }
        }

        info!("[feed] shutting down");
        let _ = stream_stop_tx.send(true);
        let stream = match stream_task.await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("[feed] stream task failed: {e}");
                None
            }
        };

        if !self.publisher.publish().await {
            warn!("[feed] final publish failed, {} may be stale", self.publisher.target().display());
        }
        self.summary(cycles, report, stream)
    }

    fn summary(&self, cycles: u64, last_cycle: CycleReport, stream: Option<StreamStats>) -> RunSummary {
        RunSummary {
            cycles,
            last_cycle,
            published: self.publisher.published(),
            publish_failures: self.publisher.failed(),
            stream,
        }
    }
}
