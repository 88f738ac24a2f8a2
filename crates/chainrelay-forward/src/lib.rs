//! chainrelay-forward: delivers normalized records to the downstream sink.
//!
//! The endpoint is chosen by event name from a static table. One `POST` per
//! record, JSON body, success = 2xx. The sink upserts by record `id`.

pub mod config;
pub mod forwarder;

pub use config::SinkConfig;
pub use forwarder::{resolve_endpoints, Ack, Forwarder, HttpForwarder};
