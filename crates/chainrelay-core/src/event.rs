//! Raw and decoded event types.

use alloy_primitives::{Address, Bytes, B256};
use indexmap::IndexMap;
use serde::Serialize;

use crate::types::NormalizedValue;

/// A raw log entry as delivered by the node. Consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    /// Contract that emitted the log
    pub address: Address,
    /// `topics[0]` is the event signature hash; `topics[1..]` are indexed arguments
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed arguments
    pub data: Bytes,
    pub block_number: u64,
    pub transaction_hash: B256,
    /// Position of the log within its block
    pub log_index: u64,
}

impl RawLog {
    /// The signature topic, if present.
    pub fn signature(&self) -> Option<&B256> {
        self.topics.first()
    }

    /// Lowercase `0x` hex of the emitting contract.
    pub fn address_hex(&self) -> String {
        format!("0x{}", hex::encode(self.address))
    }

    /// Lowercase `0x` hex of the transaction hash.
    pub fn transaction_hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.transaction_hash))
    }
}

/// A log decoded against an interface schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedEvent {
    /// Event name, e.g. "Mint"
    pub name: String,
    /// Decoded argument values keyed by argument name, in declaration order
    pub fields: IndexMap<String, NormalizedValue>,
}

impl DecodedEvent {
    /// Get a field value by name.
    pub fn field(&self, name: &str) -> Option<&NormalizedValue> {
        self.fields.get(name)
    }

    /// First field present among `names`, in the order given.
    pub fn first_field(&self, names: &[&str]) -> Option<&NormalizedValue> {
        names.iter().find_map(|n| self.fields.get(*n))
    }
}
