//! WebSocket client with auto-reconnect, keep-alive and typed events.

pub mod client;

pub use client::{Backoff, ConnState, KeepAlive, WsConnConfig, WsConnection, WsEvent};
