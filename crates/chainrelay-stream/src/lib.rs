//! # chainrelay-stream
//!
//! The supervised ingestion pipeline:
//!
//! ```text
//! Connector ──► RetryOrchestrator ──► LogProcessor (decode → normalize → forward)
//!                  one per (chain, contract)      one bounded task per log
//! ```
//!
//! [`Relay`] wires these together from a [`RelayConfig`] and owns shutdown.

pub mod config;
pub mod monitor;
pub mod orchestrator;
pub mod processor;
pub mod relay;
pub mod retry;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, RelayConfig};
pub use monitor::{ContractMonitor, ViewReading};
pub use orchestrator::{OrchestratorState, RetryOrchestrator};
pub use processor::{LogOutcome, LogProcessor};
pub use relay::{load_registry, plan, Relay, RelayContext, RelayError, SubscriptionSpec};
pub use retry::RetryPolicy;
