//! # chainrelay-core
//!
//! Core types, traits and errors shared across all ChainRelay crates.
//! The decoder, transport, forwarder and orchestrator are all built on
//! the interfaces defined here.

pub mod chain;
pub mod error;
pub mod event;
pub mod record;
pub mod schema;
pub mod transport;
pub mod types;

pub use chain::ChainId;
pub use error::{DecodeError, ForwardError, SchemaError, StreamError, TransportError};
pub use event::{DecodedEvent, RawLog};
pub use record::{record_id, NormalizedRecord};
pub use schema::{ArgDef, EventDef, InterfaceSchema};
pub use transport::{Connector, LogFilter, LogSubscription, LogTransport, SubscriptionId, TransactionInfo};
pub use types::{ArgType, NormalizedValue};
