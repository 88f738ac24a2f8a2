//! chainrelay-ws: WebSocket JSON-RPC log subscription transport.
//!
//! # Features
//! - `eth_subscribe("logs")` / `eth_unsubscribe` with per-subscription log and error channels
//! - Request multiplexing over a single connection
//! - `eth_getTransactionByHash` and `eth_call` for enrichment and contract reads
//! - No transparent reconnect: a dead socket fails its subscriptions and the
//!   caller opens a new session through [`WsConnector`]

pub mod client;
pub mod connector;
pub mod request;
pub mod subscriptions;

pub use client::{WsConfig, WsTransport};
pub use connector::WsConnector;
pub use subscriptions::SubscriptionManager;
