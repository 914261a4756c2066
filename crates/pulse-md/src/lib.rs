//! # pulse-md
//!
//! Market data side of the feed: where the numbers come from and how they reach
//! the shared state.
//!
//! ## Architecture
//!
//! ```text
//!  QuoteProvider (REST) ──► QuoteSnapshotFetcher ──┐
//!                                                  ├──► SharedMarketState ──► SnapshotPublisher ──► crypto.json
//!  WsConnection (trades) ──► TradeStreamConsumer ──┘
//! ```
//!
//! - [`provider`] — the injected summary/news port
//! - [`finnhub`] — Finnhub REST client, stream message parser, stream config
//! - [`fetcher`] — periodic 24h summary + headline cycle
//! - [`stream`] — trade stream consumer
//! - [`app`] — one-shot and continuous orchestration
//! - [`json_util`] — JSON number helpers

pub mod app;
pub mod fetcher;
pub mod finnhub;
pub mod json_util;
pub mod provider;
pub mod stream;

pub use app::{Feed, RunSummary};
pub use provider::QuoteProvider;
