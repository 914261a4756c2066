//! Trade stream consumer.
//!
//! Owns the WebSocket subscription to the provider's trade feed and applies
//! every trade to the [`SharedMarketState`], publishing a snapshot after each
//! batch. Transport events arrive on one channel and are handled on one task:
//!
//! ```text
//! WsConnection ──WsEvent──► classify() ──FeedEvent──► handle()
//!                                              ├── TradeBatch → apply_trade × n → publish
//!                                              ├── Opened     → log
//!                                              └── Error / Closed → log (the connection reconnects)
//! ```

use std::sync::Arc;

use pulse_core::publish::SnapshotPublisher;
use pulse_core::state::SharedMarketState;
use pulse_core::ws::{WsConnConfig, WsConnection, WsEvent};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::finnhub::json_parser::{self, StreamMessage, TradeTick};

/// Consumer-level view of a transport event.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Connected and subscribed (first connect or reconnect).
    Opened,
    /// One provider message worth of trades.
    TradeBatch(Vec<TradeTick>),
    /// Transport failure or provider-reported error.
    Error(String),
    /// Connection closed; a reconnect follows.
    Closed(String),
}

/// Map a transport event to a feed event.
///
/// Returns `None` for messages the feed does not care about (pings, acks,
/// undecodable text).
pub fn classify(event: WsEvent) -> Option<FeedEvent> {
    match event {
        WsEvent::Opened { .. } => Some(FeedEvent::Opened),
        WsEvent::Error { message, .. } => Some(FeedEvent::Error(message)),
        WsEvent::Closed { reason, .. } => Some(FeedEvent::Closed(reason)),
        WsEvent::Text { text, .. } => match json_parser::parse_message(&text)? {
            StreamMessage::Trades(ticks) => Some(FeedEvent::TradeBatch(ticks)),
            StreamMessage::Error(msg) => Some(FeedEvent::Error(format!("provider: {msg}"))),
            StreamMessage::Ping | StreamMessage::Other(_) => None,
        },
    }
}

/// Counters for one consumer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamStats {
    /// Times the connection reached `Subscribed`.
    pub sessions: u64,
    pub batches: u64,
    pub trades_applied: u64,
    /// Trades for untracked symbols or symbols with no summary yet.
    pub trades_ignored: u64,
    pub errors: u64,
    pub closes: u64,
}

/// Applies streamed trades to the shared state and publishes after each batch.
pub struct TradeStreamConsumer {
    state: Arc<SharedMarketState>,
    publisher: Arc<SnapshotPublisher>,
    ws_config: WsConnConfig,
}

impl TradeStreamConsumer {
    pub fn new(state: Arc<SharedMarketState>, publisher: Arc<SnapshotPublisher>, ws_config: WsConnConfig) -> Self {
        Self { state, publisher, ws_config }
    }

    /// Connect and consume until `shutdown` flips to `true`.
    ///
    /// The connection reconnects (and resubscribes) on its own; this only
    /// returns on shutdown.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> StreamStats {
        let (tx, rx) = mpsc::channel::<WsEvent>(1024);
        let mut conn = WsConnection::new(self.ws_config.clone());
        conn.start(tx);

        let stats = self.consume(rx, shutdown).await;

        conn.stop().await;
        info!("[stream] stopped — {stats:?}");
        stats
    }

    /// Drain `events` until shutdown or until the sender side goes away.
    pub async fn consume(&self, mut events: mpsc::Receiver<WsEvent>, mut shutdown: watch::Receiver<bool>) -> StreamStats {
        let mut stats = StreamStats::default();

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown.changed() => break,
                ev = events.recv() => match ev {
                    Some(ev) => self.handle(ev, &mut stats).await,
                    None => break,
                },
            }
        }
        stats
    }

    /// Process a single transport event.
    pub async fn handle(&self, event: WsEvent, stats: &mut StreamStats) {
        let Some(feed_event) = classify(event) else {
            trace!("[stream] ignored non-trade message");
            return;
        };

        match feed_event {
            FeedEvent::Opened => {
                stats.sessions += 1;
                info!("[stream] subscribed to {} symbols (session {})", self.state.tracked().len(), stats.sessions);
            }
            FeedEvent::TradeBatch(ticks) => {
                stats.batches += 1;
                for tick in &ticks {
                    if self.state.apply_trade(&tick.symbol, tick.price, tick.volume) {
                        stats.trades_applied += 1;
                    } else {
                        trace!("[stream] ignored trade for {}", tick.symbol);
                        stats.trades_ignored += 1;
                    }
                }
                debug!("[stream] batch of {} trades", ticks.len());
                self.publisher.publish().await;
            }
            FeedEvent::Error(msg) => {
                stats.errors += 1;
                warn!("[stream] error: {msg}");
            }
            FeedEvent::Closed(reason) => {
                stats.closes += 1;
                warn!("[stream] connection closed: {reason}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pulse_core::types::{MarketSnapshot, SummaryUpdate, TrackedSymbols};

    use super::*;
    use crate::finnhub;

    const BTC: &str = "BINANCE:BTCUSDT";
    const ETH: &str = "BINANCE:ETHUSDT";

    fn summary(volume: f64) -> SummaryUpdate {
        SummaryUpdate {
            volume,
            price: "100.00".into(),
            open_24h: "$99.00".into(),
            prev_close: 98.0,
            day_range: "L: $95.00 - H: $105.00".into(),
            change_24h: "▲ 1.00%".into(),
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        state: Arc<SharedMarketState>,
        publisher: Arc<SnapshotPublisher>,
        consumer: TradeStreamConsumer,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(SharedMarketState::new(TrackedSymbols::new([BTC, ETH], Vec::<String>::new())));
        state.upsert_summary(BTC, summary(1000.0));
        let publisher = Arc::new(SnapshotPublisher::new(Arc::clone(&state), dir.path().join("crypto.json")));
        let ws = finnhub::build_stream_config(
            "ws://127.0.0.1:9".into(),
            state.tracked().as_slice(),
            &Default::default(),
        );
        let consumer = TradeStreamConsumer::new(Arc::clone(&state), Arc::clone(&publisher), ws);
        Fixture { _dir: dir, state, publisher, consumer }
    }

    fn text(s: &str) -> WsEvent {
        WsEvent::Text { conn_id: 0, text: s.to_string() }
    }

    #[test]
    fn classify_covers_every_variant() {
        assert_eq!(classify(WsEvent::Opened { conn_id: 0 }), Some(FeedEvent::Opened));
        assert_eq!(
            classify(WsEvent::Closed { conn_id: 0, reason: "bye".into() }),
            Some(FeedEvent::Closed("bye".into()))
        );
        assert_eq!(
            classify(WsEvent::Error { conn_id: 0, message: "boom".into() }),
            Some(FeedEvent::Error("boom".into()))
        );
        assert_eq!(classify(text(r#"{"type":"ping"}"#)), None);
        assert_eq!(classify(text("garbage")), None);
        assert!(matches!(
            classify(text(r#"{"type":"trade","data":[]}"#)),
            Some(FeedEvent::TradeBatch(ref t)) if t.is_empty()
        ));
    }

    #[tokio::test]
    async fn trade_batch_accumulates_and_publishes() {
        let f = fixture();
        let mut stats = StreamStats::default();

        f.consumer.handle(
            text(r#"{"type":"trade","data":[
                {"s":"BINANCE:BTCUSDT","p":64000.12,"v":0.5,"t":1},
                {"s":"BINANCE:BTCUSDT","p":64001.5,"v":1.25,"t":2}
            ]}"#),
            &mut stats,
        )
        .await;

        let m = f.state.metrics(BTC).unwrap();
        assert_eq!(m.raw_volume, 1001.75);
        assert_eq!(m.volume_24h, "1,001.75");
        assert_eq!(m.price, "64001.50000");
        assert_eq!(stats.trades_applied, 2);
        assert_eq!(stats.batches, 1);
        assert_eq!(f.publisher.published(), 1);

        let on_disk: MarketSnapshot =
            serde_json::from_str(&std::fs::read_to_string(f.publisher.target()).unwrap()).unwrap();
        assert_eq!(on_disk.get(BTC).unwrap().raw_volume, 1001.75);
    }

    #[tokio::test]
    async fn unknown_and_unseeded_symbols_are_ignored() {
        let f = fixture();
        let mut stats = StreamStats::default();

        f.consumer.handle(
            text(r#"{"type":"trade","data":[
                {"s":"BINANCE:XRPUSDT","p":0.5,"v":100},
                {"s":"BINANCE:ETHUSDT","p":3000,"v":1}
            ]}"#),
            &mut stats,
        )
        .await;

        assert_eq!(stats.trades_ignored, 2);
        assert!(f.state.metrics("BINANCE:XRPUSDT").is_none());
        assert!(f.state.metrics(ETH).is_none());
        assert_eq!(f.state.metrics(BTC).unwrap().raw_volume, 1000.0);
    }

    #[tokio::test]
    async fn bad_volumes_never_reach_the_accumulator() {
        let f = fixture();
        let mut stats = StreamStats::default();

        f.consumer
            .handle(
                text(r#"{"type":"trade","data":[
                    {"s":"BINANCE:BTCUSDT","p":1,"v":-40},
                    {"s":"BINANCE:BTCUSDT","p":1,"v":"NaN"},
                    {"s":"BINANCE:BTCUSDT","p":2,"v":5}
                ]}"#),
                &mut stats,
            )
            .await;

        assert_eq!(stats.trades_applied, 1);
        let m = f.state.metrics(BTC).unwrap();
        assert_eq!(m.raw_volume, 1005.0);
        assert_eq!(m.volume_24h, "1,005.00");

        let on_disk = std::fs::read_to_string(f.publisher.target()).unwrap();
        assert!(on_disk.contains("\"raw_volume\": 1005.0"));
    }

    #[tokio::test]
    async fn non_trade_messages_do_not_publish() {
        let f = fixture();
        let mut stats = StreamStats::default();

        f.consumer.handle(text(r#"{"type":"ping"}"#), &mut stats).await;
        f.consumer.handle(WsEvent::Opened { conn_id: 0 }, &mut stats).await;
        f.consumer.handle(WsEvent::Closed { conn_id: 0, reason: "eof".into() }, &mut stats).await;
        f.consumer.handle(text(r#"{"type":"error","msg":"bad symbol"}"#), &mut stats).await;

        assert_eq!(f.publisher.published(), 0);
        assert_eq!(stats.sessions, 1);
        assert_eq!(stats.closes, 1);
        assert_eq!(stats.errors, 1);
    }

    #[tokio::test]
    async fn consume_runs_until_shutdown() {
        let f = fixture();
        let (tx, rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tx.send(WsEvent::Opened { conn_id: 0 }).await.unwrap();
        tx.send(text(r#"{"type":"trade","data":[{"s":"BINANCE:BTCUSDT","p":1,"v":2}]}"#)).await.unwrap();
        tx.send(WsEvent::Error { conn_id: 0, message: "reset".into() }).await.unwrap();
        tx.send(WsEvent::Opened { conn_id: 0 }).await.unwrap();
        tx.send(text(r#"{"type":"trade","data":[{"s":"BINANCE:BTCUSDT","p":1,"v":3}]}"#)).await.unwrap();

        let consumer = f.consumer;
        let task = tokio::spawn(async move { consumer.consume(rx, shutdown_rx).await });

        // Wait until both batches landed, then stop.
        tokio::time::timeout(Duration::from_secs(5), async {
            while f.publisher.published() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        shutdown_tx.send(true).unwrap();

        let stats = task.await.unwrap();
        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.errors, 1);
        assert_eq!(f.state.metrics(BTC).unwrap().raw_volume, 1005.0);
        drop(tx);
    }
}
