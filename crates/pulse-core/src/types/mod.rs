//! Core data types: tracked symbols, metric records, snapshots.

pub mod metrics;
pub mod symbol;

pub use metrics::*;
pub use symbol::*;
