//! Error types for the ChainRelay pipeline.
//!
//! The taxonomy mirrors how failures are handled:
//! - [`TransportError`] / [`StreamError`]: transient infrastructure, retried by the orchestrator
//! - [`DecodeError`]: local to one log, logged and skipped
//! - [`ForwardError`]: local to one record, logged, never retried

use thiserror::Error;

/// Errors raised while building an interface schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid ABI JSON: {reason}")]
    InvalidAbi { reason: String },

    #[error("unsupported argument type '{ty}' in {event}")]
    UnsupportedType { event: String, ty: String },

    #[error("schema '{schema}' declares the same event signature twice: {signature}")]
    DuplicateEvent { schema: String, signature: String },

    #[error("invalid address book: {reason}")]
    InvalidAddressBook { reason: String },

    #[error("schema '{name}' not found")]
    NotFound { name: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while decoding a single log.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown event signature {signature}")]
    UnknownEvent { signature: String },

    #[error("log has no topics")]
    NoTopics,

    #[error("event {event} declares {expected} indexed arguments but the log carries {got} topics")]
    MissingTopic {
        event: String,
        expected: usize,
        got: usize,
    },

    #[error("ABI decode failed for {event}: {reason}")]
    AbiDecodeFailed { event: String, reason: String },
}

impl DecodeError {
    /// Unknown signatures are routine (the contract emits events we don't
    /// track); everything else means the log itself is malformed.
    pub fn is_unknown_event(&self) -> bool {
        matches!(self, Self::UnknownEvent { .. } | Self::NoTopics)
    }
}

/// A JSON-RPC protocol-level error returned by the node.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl std::fmt::Display for RpcErrorObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// Errors that can occur on the upstream node connection.
#[derive(Debug, Error)]
pub enum TransportError {
    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(RpcErrorObject),

    /// Request timed out after the configured duration.
    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The connection is gone; no further requests can be served.
    #[error("connection closed")]
    Closed,

    /// Response could not be deserialized.
    #[error("deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors from the connect → subscribe → drain cycle.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("connection to {url} failed: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("log subscription failed: {0}")]
    SubscriptionFailed(#[source] TransportError),

    #[error("subscription dropped mid-stream: {0}")]
    SubscriptionDropped(#[source] TransportError),

    #[error("gave up after {attempts} attempts; last error: {last_error}")]
    Aborted { attempts: u32, last_error: String },
}

/// Errors from delivering a record to the downstream sink.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("sink request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("sink {url} answered HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("invalid sink endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}
