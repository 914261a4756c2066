//! # pulse-core
//!
//! Core crate for the pulse market snapshot feed, providing:
//!
//! - **Types** (`types`) — tracked symbols, price classes, metric records, snapshots
//! - **Formatting** (`format`) — dashboard display strings
//! - **Shared state** (`state`) — the lock-guarded symbol → metrics map
//! - **Publishing** (`publish`) — atomic temp-file + rename snapshot writer
//! - **WebSocket** (`ws`) — reconnecting client with keep-alive and typed events
//! - **Configuration** (`config`) — JSON config deserialization
//! - **Error types** (`error`) — domain-specific `PulseError` via thiserror
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod publish;
pub mod state;
pub mod types;
pub mod ws;

// Re-export types at crate root for convenience.
pub use types::*;
