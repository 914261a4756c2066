//! Single WebSocket connection with auto-reconnect and ping keep-alive.
//!
//! Each `WsConnection` runs as a tokio task that:
//! 1. Connects to the provider WebSocket endpoint (TLS).
//! 2. Sends every subscription message, on every (re)connect.
//! 3. Forwards inbound frames to the consumer as [`WsEvent`]s.
//! 4. Sends periodic ping frames and drops the connection when nothing comes
//!    back within the pong timeout.
//! 5. Reconnects with exponential backoff, forever, until shut down.
//!
//! ```text
//! Disconnected ──► Connecting ──► Subscribed ──► Receiving
//!      ▲               │               │              │
//!      └───────────────┴── error / close / pong timeout
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tracing::{debug, error, info, warn};

use crate::error::{PulseError, PulseResult};

/// Transport state of a [`WsConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    /// Handshake done and every subscription message sent.
    Subscribed,
    /// At least one data frame received on the current connection.
    Receiving,
}

/// Transport event delivered to the consumer task.
#[derive(Debug, Clone, PartialEq)]
pub enum WsEvent {
    /// Connected and subscribed.
    Opened { conn_id: usize },
    /// A text frame.
    Text { conn_id: usize, text: String },
    /// A transport-level failure; the connection is being torn down.
    Error { conn_id: usize, message: String },
    /// The connection ended (close frame, end of stream, pong timeout).
    Closed { conn_id: usize, reason: String },
}

/// Reconnect backoff bounds.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self { initial: Duration::from_millis(100), max: Duration::from_secs(30) }
    }
}

/// Keep-alive settings: ping every `interval`, give up after `pong_timeout`
/// without any inbound frame.
#[derive(Debug, Clone, Copy)]
pub struct KeepAlive {
    pub interval: Duration,
    pub pong_timeout: Duration,
}

/// Configuration for a single WebSocket connection.
#[derive(Debug, Clone)]
pub struct WsConnConfig {
    /// Full WebSocket URL (e.g. `wss://ws.finnhub.io?token=...`).
    pub url: String,
    /// Messages sent, in order, immediately after every successful connect.
    pub subscribe_msgs: Vec<String>,
    /// Ping / pong-timeout pair. `None` disables pinging.
    pub keep_alive: Option<KeepAlive>,
    pub backoff: Backoff,
    /// Connection identifier used in log lines and events.
    pub id: usize,
}

/// A single WebSocket connection managed by a background tokio task.
pub struct WsConnection {
    /// Connection configuration.
    pub config: WsConnConfig,
    /// Shutdown signal sender.
    shutdown_tx: Option<watch::Sender<bool>>,
    state_tx: watch::Sender<ConnState>,
    /// Task join handle.
    task: Option<tokio::task::JoinHandle<()>>,
}

impl WsConnection {
    /// Create a new (not yet started) connection.
    pub fn new(config: WsConnConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnState::Disconnected);
        Self { config, shutdown_tx: None, state_tx, task: None }
    }

    /// Start the connection task. Events are pushed into `events`; the task
    /// exits when shut down or when the receiver is dropped.
    pub fn start(&mut self, events: mpsc::Sender<WsEvent>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = self.config.clone();
        let state_tx = self.state_tx.clone();

        let task = tokio::spawn(async move {
            connection_loop(config, events, state_tx, shutdown_rx).await;
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);
    }

    /// Watch the transport state.
    pub fn state(&self) -> watch::Receiver<ConnState> {
        self.state_tx.subscribe()
    }

    /// Stop the connection and wait for the task to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.state_tx.send_replace(ConnState::Disconnected);
    }
}

/// Why a single connection session ended.
enum SessionEnd {
    /// Shutdown requested or consumer gone; leave the outer loop.
    Stop,
    /// Transport failure; reconnect after backoff.
    Reconnect,
}

/// Main connection loop — connects, subscribes, reads, pings, reconnects.
async fn connection_loop(
    config: WsConnConfig,
    events: mpsc::Sender<WsEvent>,
    state_tx: watch::Sender<ConnState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut backoff = config.backoff.initial;
    let conn_id = config.id;

    loop {
        // Check shutdown before connecting
        if *shutdown_rx.borrow() {
            info!("[ws-{conn_id}] shutdown requested");
            break;
        }

        state_tx.send_replace(ConnState::Connecting);
        info!("[ws-{conn_id}] connecting to {}", redact(&config.url));

        let connected = tokio::select! {
            res = connect_ws(&config.url) => res,
            _ = shutdown_rx.changed() => break,
        };

        let end = match connected {
            Ok(stream) => {
                backoff = config.backoff.initial; // reset backoff on success
                info!("[ws-{conn_id}] connected");
                run_session(&config, stream, &events, &state_tx, &mut shutdown_rx).await
            }
            Err(e) => {
                error!("[ws-{conn_id}] connection failed: {e}");
                let ev = WsEvent::Error { conn_id, message: e.to_string() };
                report(&events, &mut shutdown_rx, ev).await
            }
        };

        state_tx.send_replace(ConnState::Disconnected);
        if let SessionEnd::Stop = end {
            break;
        }

        // Disconnected; will reconnect at the top of the outer loop
        warn!("[ws-{conn_id}] disconnected, reconnecting in {backoff:?}");
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {},
            _ = shutdown_rx.changed() => break,
        }
        backoff = (backoff * 2).min(config.backoff.max);
    }

    state_tx.send_replace(ConnState::Disconnected);
}

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// One connected session: subscribe, then pump frames until something breaks.
async fn run_session(
    config: &WsConnConfig,
    stream: WsStream,
    events: &mpsc::Sender<WsEvent>,
    state_tx: &watch::Sender<ConnState>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let conn_id = config.id;
    let (mut ws_write, mut ws_read) = stream.split();

    // Subscriptions are re-sent on every connect; the provider forgets them
    // when the socket drops.
    for sub_msg in &config.subscribe_msgs {
        debug!("[ws-{conn_id}] subscribing: {sub_msg}");
        if let Err(e) = ws_write.send(Message::Text(sub_msg.clone().into())).await {
            error!("[ws-{conn_id}] subscribe send failed: {e}");
            return report(events, shutdown_rx, WsEvent::Error { conn_id, message: e.to_string() }).await;
        }
    }
    state_tx.send_replace(ConnState::Subscribed);
    if let SessionEnd::Stop = report(events, shutdown_rx, WsEvent::Opened { conn_id }).await {
        return SessionEnd::Stop;
    }

    let far_future = Duration::from_secs(86_400 * 365);
    let ping_every = config.keep_alive.map(|k| k.interval).unwrap_or(far_future);
    let mut ping_tick = tokio::time::interval_at(Instant::now() + ping_every, ping_every);
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    // Deadline for the next inbound frame after a ping; `None` while idle.
    let mut pong_deadline: Option<Instant> = None;

    loop {
        let deadline = pong_deadline.unwrap_or_else(|| Instant::now() + far_future);

        tokio::select! {
            // Shutdown signal
            _ = shutdown_rx.changed() => {
                info!("[ws-{conn_id}] shutdown signal received");
                let _ = ws_write.close().await;
                return SessionEnd::Stop;
            }

            // Incoming message
            msg = ws_read.next() => {
                // Any inbound frame proves the peer is alive.
                pong_deadline = None;
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if *state_tx.borrow() != ConnState::Receiving {
                            state_tx.send_replace(ConnState::Receiving);
                        }
                        let ev = WsEvent::Text { conn_id, text: text.as_str().to_owned() };
                        if let SessionEnd::Stop = report(events, shutdown_rx, ev).await {
                            let _ = ws_write.close().await;
                            return SessionEnd::Stop;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame.map(|f| f.reason.as_str().to_owned()).unwrap_or_default();
                        warn!("[ws-{conn_id}] received close frame: {reason}");
                        return report(events, shutdown_rx, WsEvent::Closed { conn_id, reason }).await;
                    }
                    Some(Err(e)) => {
                        error!("[ws-{conn_id}] read error: {e}");
                        return report(events, shutdown_rx, WsEvent::Error { conn_id, message: e.to_string() }).await;
                    }
                    None => {
                        warn!("[ws-{conn_id}] stream ended");
                        return report(events, shutdown_rx, WsEvent::Closed { conn_id, reason: "stream ended".into() }).await;
                    }
                    _ => {} // Pong, Binary, Frame — liveness only
                }
            }

            // Ping timer
            _ = ping_tick.tick(), if config.keep_alive.is_some() => {
                if let Err(e) = ws_write.send(Message::Ping(Vec::new().into())).await {
                    error!("[ws-{conn_id}] ping send error: {e}");
                    return report(events, shutdown_rx, WsEvent::Error { conn_id, message: e.to_string() }).await;
                }
                if let (None, Some(k)) = (pong_deadline, config.keep_alive) {
                    pong_deadline = Some(Instant::now() + k.pong_timeout);
                }
            }

            // Pong timeout
            _ = tokio::time::sleep_until(deadline), if pong_deadline.is_some() => {
                warn!("[ws-{conn_id}] no pong within timeout, dropping connection");
                return report(events, shutdown_rx, WsEvent::Closed { conn_id, reason: "pong timeout".into() }).await;
            }
        }
    }
}

/// Forward an event to the consumer. A dropped consumer or a shutdown while
/// the channel is full both end the loop.
async fn report(
    events: &mpsc::Sender<WsEvent>,
    shutdown_rx: &mut watch::Receiver<bool>,
    ev: WsEvent,
) -> SessionEnd {
    tokio::select! {
        res = events.send(ev) => if res.is_ok() { SessionEnd::Reconnect } else { SessionEnd::Stop },
        _ = shutdown_rx.changed() => SessionEnd::Stop,
    }
}

/// Establish a (possibly TLS) WebSocket connection.
async fn connect_ws(url: &str) -> PulseResult<WsStream> {
    let request = url.into_client_request().map_err(|e| PulseError::WebSocket(format!("bad url: {e}")))?;
    let (stream, _response) =
        tokio_tungstenite::connect_async(request).await.map_err(|e| PulseError::WebSocket(e.to_string()))?;
    Ok(stream)
}

/// Strip the query string (it carries the API token) for logging.
fn redact(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut u) => {
            if u.query().is_some() {
                u.set_query(Some("redacted"));
            }
            u.to_string()
        }
        Err(_) => url.split('?').next().unwrap_or_default().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;

    #[test]
    fn redact_hides_token() {
        assert_eq!(redact("wss://ws.finnhub.io?token=secret"), "wss://ws.finnhub.io/?redacted");
        assert_eq!(redact("wss://ws.finnhub.io/"), "wss://ws.finnhub.io/");
    }

    fn test_config(url: String) -> WsConnConfig {
        WsConnConfig {
            url,
            subscribe_msgs: vec!["sub-A".into(), "sub-B".into()],
            keep_alive: None,
            backoff: Backoff { initial: Duration::from_millis(10), max: Duration::from_millis(50) },
            id: 7,
        }
    }

    async fn next_event(rx: &mut mpsc::Receiver<WsEvent>) -> WsEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap()
    }

    /// Accept one client, collect the two subscription frames, push `reply`,
    /// then drop the socket.
    async fn serve_once(listener: &TcpListener, reply: &str) -> Vec<String> {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let mut subs = Vec::new();
        while subs.len() < 2 {
            if let Some(Ok(Message::Text(t))) = ws.next().await {
                subs.push(t.as_str().to_owned());
            }
        }
        ws.send(Message::Text(reply.to_string().into())).await.unwrap();
        let _ = ws.close(None).await;
        subs
    }

    #[tokio::test]
    async fn resubscribes_after_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let first = serve_once(&listener, "one").await;
            let second = serve_once(&listener, "two").await;
            (first, second)
        });

        let (tx, mut rx) = mpsc::channel(32);
        let mut conn = WsConnection::new(test_config(url));
        conn.start(tx);

        assert_eq!(next_event(&mut rx).await, WsEvent::Opened { conn_id: 7 });
        assert_eq!(next_event(&mut rx).await, WsEvent::Text { conn_id: 7, text: "one".into() });

        // The first session ends (close or error), then a fresh session opens.
        loop {
            match next_event(&mut rx).await {
                WsEvent::Opened { .. } => break,
                WsEvent::Closed { .. } | WsEvent::Error { .. } => continue,
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(next_event(&mut rx).await, WsEvent::Text { conn_id: 7, text: "two".into() });

        let (first, second) = server.await.unwrap();
        assert_eq!(first, vec!["sub-A", "sub-B"]);
        assert_eq!(second, vec!["sub-A", "sub-B"]);

        conn.stop().await;
        assert_eq!(*conn.state().borrow(), ConnState::Disconnected);
    }

    #[tokio::test]
    async fn connect_failure_is_reported_and_retried() {
        // Bind then drop to get a port nobody listens on.
        let addr = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap()
        };

        let (tx, mut rx) = mpsc::channel(32);
        let mut conn = WsConnection::new(test_config(format!("ws://{addr}")));
        conn.start(tx);

        for _ in 0..2 {
            assert!(matches!(next_event(&mut rx).await, WsEvent::Error { conn_id: 7, .. }));
        }
        conn.stop().await;
    }

    #[tokio::test]
    async fn silent_peer_hits_pong_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        // Server completes the handshake, then never reads again, so our pings
        // are never answered.
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            tokio::time::sleep(Duration::from_secs(3)).await;
            drop(ws);
        });

        let mut cfg = test_config(url);
        cfg.subscribe_msgs.clear();
        cfg.keep_alive = Some(KeepAlive {
            interval: Duration::from_millis(50),
            pong_timeout: Duration::from_millis(100),
        });

        let (tx, mut rx) = mpsc::channel(32);
        let mut conn = WsConnection::new(cfg);
        conn.start(tx);

        assert_eq!(next_event(&mut rx).await, WsEvent::Opened { conn_id: 7 });
        assert_eq!(
            next_event(&mut rx).await,
            WsEvent::Closed { conn_id: 7, reason: "pong timeout".into() }
        );

        conn.stop().await;
        server.abort();
    }

    #[tokio::test]
    async fn connect_errors_are_classified() {
        let Err(err) = connect_ws("not a url").await else {
            panic!("expected an error");
        };
        assert_eq!(err.kind(), "websocket");

        let addr = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap()
        };
        let Err(err) = connect_ws(&format!("ws://{addr}")).await else {
            panic!("expected an error");
        };
        assert_eq!(err.kind(), "websocket");
    }
}
