//! `NormalizedRecord`: the unit of idempotent delivery to the sink.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::types::NormalizedValue;

/// Stable record key derived from (transaction hash, log index) only.
///
/// Redelivery of the same log after a reconnect maps to the same id, which
/// lets the sink upsert instead of duplicating. Event content never feeds
/// into the id.
pub fn record_id(transaction_hash: &str, log_index: u64) -> String {
    let tx = transaction_hash.trim().to_ascii_lowercase();
    let tx = tx.strip_prefix("0x").unwrap_or(&tx);
    let mut hasher = Sha256::new();
    hasher.update(tx.as_bytes());
    hasher.update(b":");
    hasher.update(log_index.to_string().as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// Canonical persisted shape of one decoded log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    /// See [`record_id`]
    pub id: String,
    pub chain_id: u64,
    pub contract_address: String,
    pub event_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_address: Option<String>,
    /// All decoded arguments, in declaration order
    pub payload: IndexMap<String, NormalizedValue>,
    pub block_number: u64,
    pub transaction_hash: String,
    pub log_index: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    /// Counterparty address
    #[serde(rename = "to", skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_chain_selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_chain_selector: Option<String>,
    /// Processing time, not block time
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const TX: &str = "0x9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    #[test]
    fn id_is_pure_function_of_tx_and_index() {
        assert_eq!(record_id(TX, 3), record_id(TX, 3));
        assert_ne!(record_id(TX, 3), record_id(TX, 4));
    }

    #[test]
    fn id_ignores_hex_case_and_prefix() {
        let upper = TX.to_ascii_uppercase().replacen("0X", "0x", 1);
        assert_eq!(record_id(TX, 0), record_id(&upper, 0));
        assert_eq!(record_id(TX, 0), record_id(&TX[2..], 0));
    }

    #[test]
    fn id_format() {
        let id = record_id(TX, 0);
        assert!(id.starts_with("0x"));
        assert_eq!(id.len(), 66);
    }

    #[test]
    fn record_serializes_camel_case_and_skips_unset() {
        let now = Utc::now();
        let mut payload = IndexMap::new();
        payload.insert("amount".to_string(), NormalizedValue::Uint("1000".into()));
        let record = NormalizedRecord {
            id: record_id(TX, 1),
            chain_id: 80_002,
            contract_address: "0xaa".into(),
            event_name: "Mint".into(),
            caller_address: None,
            payload,
            block_number: 7,
            transaction_hash: TX.into(),
            log_index: 1,
            amount: Some("1000".into()),
            to: Some("0x01".into()),
            message_id: None,
            source_chain_selector: None,
            destination_chain_selector: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["eventName"], "Mint");
        assert_eq!(json["chainId"], 80_002);
        assert_eq!(json["amount"], "1000");
        assert_eq!(json["to"], "0x01");
        assert_eq!(json["payload"]["amount"], "1000");
        assert!(json.get("callerAddress").is_none());
        assert!(json.get("messageId").is_none());
    }
}
