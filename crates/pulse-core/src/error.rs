//! Typed error definitions for the pulse feed.
//!
//! Every failure in the feed is recoverable (skip a symbol, keep a stale
//! ticker, reconnect, leave the old snapshot on disk), but each one is
//! classified here so the log line says *what* went wrong. All variants
//! implement `std::error::Error` via `thiserror`, so they convert into
//! `anyhow::Error` at the binary boundary.

use thiserror::Error;

/// Domain-specific errors for the pulse feed.
#[derive(Debug, Error)]
pub enum PulseError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// Network-level failure talking to the provider (connect, timeout, body read).
    #[error("transport error: {0}")]
    Transport(String),

    /// Provider answered with a non-success HTTP status.
    #[error("http error: status {status} from {endpoint}")]
    Http { status: u16, endpoint: String },

    /// Provider payload could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// WebSocket connection, handshake, or communication error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Snapshot serialization error.
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// File-system error while persisting a snapshot.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PulseError {
    /// Short class label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Transport(_) => "transport",
            Self::Http { .. } => "http",
            Self::Parse(_) => "parse",
            Self::WebSocket(_) => "websocket",
            Self::Serialize(_) => "serialize",
            Self::Io(_) => "io",
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type PulseResult<T> = Result<T, PulseError>;
