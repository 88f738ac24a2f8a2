//! # chainrelay-observability
//!
//! Structured logging (`tracing`) setup and the relay's counters.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::{MetricsSnapshot, RelayMetrics};
pub use tracing_setup::{init_tracing, LogConfig};
