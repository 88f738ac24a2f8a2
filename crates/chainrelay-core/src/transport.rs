//! Upstream transport abstractions.
//!
//! [`Connector`] opens a fresh session per attempt; [`LogTransport`] is one
//! live session able to register log subscriptions and answer auxiliary
//! lookups. Both are object-safe so the orchestrator holds them as
//! `Arc<dyn ...>` and tests can substitute scripted fakes.

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::chain::ChainId;
use crate::error::{StreamError, TransportError};
use crate::event::RawLog;

/// Server-side log filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    /// Only logs emitted by this contract
    pub address: Address,
    /// Optional `topics[0]` alternatives; empty = any event
    pub signatures: Vec<B256>,
}

impl LogFilter {
    pub fn for_contract(address: Address) -> Self {
        Self {
            address,
            signatures: vec![],
        }
    }

    pub fn with_signatures(mut self, signatures: impl IntoIterator<Item = B256>) -> Self {
        self.signatures.extend(signatures);
        self
    }

    /// The `eth_subscribe("logs", <filter>)` parameter object.
    pub fn to_params(&self) -> Value {
        let address = format!("0x{}", hex::encode(self.address));
        if self.signatures.is_empty() {
            serde_json::json!({ "address": address })
        } else {
            let sigs: Vec<String> = self
                .signatures
                .iter()
                .map(|s| format!("0x{}", hex::encode(s)))
                .collect();
            serde_json::json!({ "address": address, "topics": [sigs] })
        }
    }
}

/// A unique subscription ID returned by `eth_subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub String);

impl From<String> for SubscriptionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live log subscription: the log channel plus its error channel.
///
/// A value (or closure) on `errors` means the subscription is dead and the
/// owner must reconnect with a brand-new transport.
#[derive(Debug)]
pub struct LogSubscription {
    pub id: SubscriptionId,
    pub logs: mpsc::UnboundedReceiver<RawLog>,
    pub errors: mpsc::UnboundedReceiver<TransportError>,
}

/// Transaction fields used for diagnostic enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub hash: B256,
    #[serde(default)]
    pub from: Option<Address>,
    #[serde(default)]
    pub to: Option<Address>,
    pub nonce: U64,
    #[serde(default)]
    pub gas_price: Option<U256>,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub input: Bytes,
}

/// One live upstream session.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` so log-processing tasks can share
/// the session for enrichment lookups.
#[async_trait]
pub trait LogTransport: Send + Sync {
    /// Register a filtered log subscription.
    async fn subscribe_logs(&self, filter: &LogFilter) -> Result<LogSubscription, TransportError>;

    /// Release a server-side subscription. Returns the node's acknowledgement.
    async fn unsubscribe(&self, id: &SubscriptionId) -> Result<bool, TransportError>;

    /// `eth_getTransactionByHash`.
    async fn transaction_by_hash(&self, hash: &B256) -> Result<Option<TransactionInfo>, TransportError>;

    /// `eth_call` against the latest block.
    async fn call(&self, to: &Address, data: &Bytes) -> Result<Bytes, TransportError>;
}

/// Opens upstream sessions. Must hand out a new session on every call.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, chain: &ChainId) -> Result<Arc<dyn LogTransport>, StreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_params_address_only() {
        let f = LogFilter::for_contract(Address::repeat_byte(0xAA));
        let params = f.to_params();
        assert_eq!(params["address"], format!("0x{}", "aa".repeat(20)));
        assert!(params.get("topics").is_none());
    }

    #[test]
    fn filter_params_with_signatures() {
        let f = LogFilter::for_contract(Address::ZERO)
            .with_signatures([B256::repeat_byte(0x01), B256::repeat_byte(0x02)]);
        let params = f.to_params();
        assert_eq!(params["topics"][0].as_array().unwrap().len(), 2);
    }

    #[test]
    fn transaction_info_from_rpc_json() {
        let json = serde_json::json!({
            "hash": format!("0x{}", "ab".repeat(32)),
            "from": format!("0x{}", "01".repeat(20)),
            "to": null,
            "nonce": "0x2a",
            "gasPrice": "0x3b9aca00",
            "value": "0x0",
            "input": "0x60806040",
            "blockNumber": "0x10"
        });
        let tx: TransactionInfo = serde_json::from_value(json).unwrap();
        assert_eq!(tx.nonce, U64::from(42));
        assert_eq!(tx.gas_price, Some(U256::from(1_000_000_000u64)));
        assert!(tx.to.is_none());
        assert_eq!(tx.input.len(), 4);
    }
}
