//! Value normalization and `NormalizedRecord` construction.
//!
//! `normalize` maps alloy `DynSolValue`s onto the string-first
//! [`NormalizedValue`] model. [`EventNormalizer`] merges a decoded event
//! with its log metadata into the record shape the sink persists.

use alloy_core::dyn_abi::DynSolValue;
use chainrelay_core::{
    event::{DecodedEvent, RawLog},
    record::{record_id, NormalizedRecord},
    types::NormalizedValue,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Convert a decoded `DynSolValue` into a `NormalizedValue`.
pub fn normalize(val: DynSolValue) -> NormalizedValue {
    match val {
        DynSolValue::Bool(b) => NormalizedValue::Bool(b),
        DynSolValue::Int(i, _bits) => NormalizedValue::Int(i.to_string()),
        DynSolValue::Uint(u, _bits) => NormalizedValue::Uint(u.to_string()),
        DynSolValue::FixedBytes(word, size) => NormalizedValue::bytes_from_slice(&word[..size]),
        DynSolValue::Bytes(b) => NormalizedValue::bytes_from_slice(&b),
        DynSolValue::String(s) => NormalizedValue::Str(s),
        DynSolValue::Address(a) => NormalizedValue::address_from_slice(a.as_slice()),
        DynSolValue::Array(vals) | DynSolValue::FixedArray(vals) | DynSolValue::Tuple(vals) => {
            NormalizedValue::Array(vals.into_iter().map(normalize).collect())
        }
        DynSolValue::Function(f) => NormalizedValue::bytes_from_slice(f.as_slice()),
    }
}

// ─── Caller extraction ───────────────────────────────────────────────────────

/// How the `callerAddress` of a record is derived. Configured per event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "CallerSpec", into = "CallerSpec")]
pub enum CallerStrategy {
    /// Tiered rule:
    /// 1. a leading `from` argument holding an address,
    /// 2. an all-zero `topics[1]` → trailing 20 bytes of the transaction hash,
    /// 3. otherwise the trailing 20 bytes of `topics[1]`.
    #[default]
    Heuristic,
    /// A named decoded argument, if it is an address.
    Argument(String),
    /// Trailing 20 bytes of `topics[n]`.
    Topic(usize),
    None,
}

/// Config-file spelling: `heuristic`, `none`, `{argument: <name>}` or `{topic: <n>}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum CallerSpec {
    Keyword(String),
    Argument { argument: String },
    Topic { topic: usize },
}

impl TryFrom<CallerSpec> for CallerStrategy {
    type Error = String;

    fn try_from(spec: CallerSpec) -> Result<Self, Self::Error> {
        match spec {
            CallerSpec::Keyword(k) => match k.as_str() {
                "heuristic" => Ok(Self::Heuristic),
                "none" => Ok(Self::None),
                other => Err(format!(
                    "unknown caller strategy '{other}' (expected heuristic, none, argument or topic)"
                )),
            },
            CallerSpec::Argument { argument } => Ok(Self::Argument(argument)),
            CallerSpec::Topic { topic } => Ok(Self::Topic(topic)),
        }
    }
}

impl From<CallerStrategy> for CallerSpec {
    fn from(s: CallerStrategy) -> Self {
        match s {
            CallerStrategy::Heuristic => CallerSpec::Keyword("heuristic".into()),
            CallerStrategy::None => CallerSpec::Keyword("none".into()),
            CallerStrategy::Argument(argument) => CallerSpec::Argument { argument },
            CallerStrategy::Topic(topic) => CallerSpec::Topic { topic },
        }
    }
}

/// Default strategy plus per-event overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerConfig {
    #[serde(default)]
    pub default: CallerStrategy,
    #[serde(default)]
    pub events: HashMap<String, CallerStrategy>,
}

impl CallerConfig {
    pub fn strategy_for(&self, event: &str) -> &CallerStrategy {
        self.events.get(event).unwrap_or(&self.default)
    }
}

fn trailing_address(word: &[u8]) -> String {
    let start = word.len().saturating_sub(20);
    format!("0x{}", hex::encode(&word[start..]))
}

impl CallerStrategy {
    /// Resolve the caller for one log. `None` when the strategy yields nothing.
    pub fn extract(&self, raw: &RawLog, decoded: &DecodedEvent) -> Option<String> {
        match self {
            CallerStrategy::None => None,
            CallerStrategy::Topic(n) => raw.topics.get(*n).map(|t| trailing_address(t.as_slice())),
            CallerStrategy::Argument(name) => {
                decoded.field(name).and_then(|v| v.as_address()).map(str::to_string)
            }
            CallerStrategy::Heuristic => heuristic_caller(raw, decoded),
        }
    }
}

fn heuristic_caller(raw: &RawLog, decoded: &DecodedEvent) -> Option<String> {
    if let Some((name, value)) = decoded.fields.first() {
        if name == "from" {
            if let Some(addr) = value.as_address() {
                return Some(addr.to_string());
            }
            if let Some(word) = raw.data.get(..32) {
                let (pad, tail) = word.split_at(12);
                if pad.iter().all(|b| *b == 0) && tail.iter().any(|b| *b != 0) {
                    return Some(trailing_address(word));
                }
            }
        }
    }

    let topic = raw.topics.get(1)?;
    if topic.as_slice().iter().all(|b| *b == 0) {
        // zero sentinel: mint-style event, attribute to the transaction
        return Some(trailing_address(raw.transaction_hash.as_slice()));
    }
    Some(trailing_address(topic.as_slice()))
}

// ─── Record assembly ─────────────────────────────────────────────────────────

const AMOUNT_FIELDS: &[&str] = &["amount", "value"];
const TO_FIELDS: &[&str] = &["to", "receiver", "recipient"];

/// Builds [`NormalizedRecord`]s from decoded events.
#[derive(Debug, Clone, Default)]
pub struct EventNormalizer {
    caller: CallerConfig,
}

impl EventNormalizer {
    pub fn new(caller: CallerConfig) -> Self {
        Self { caller }
    }

    pub fn caller_config(&self) -> &CallerConfig {
        &self.caller
    }

    /// Merge decoded fields and log metadata. Timestamps are processing time.
    pub fn normalize(&self, raw: &RawLog, decoded: &DecodedEvent, chain_id: u64) -> NormalizedRecord {
        let transaction_hash = raw.transaction_hash_hex();
        let now = Utc::now();
        let scalar = |names: &[&str]| decoded.first_field(names).and_then(|v| v.as_scalar());

        NormalizedRecord {
            id: record_id(&transaction_hash, raw.log_index),
            chain_id,
            contract_address: raw.address_hex(),
            event_name: decoded.name.clone(),
            caller_address: self.caller.strategy_for(&decoded.name).extract(raw, decoded),
            payload: decoded.fields.clone(),
            block_number: raw.block_number,
            transaction_hash,
            log_index: raw.log_index,
            amount: scalar(AMOUNT_FIELDS),
            to: scalar(TO_FIELDS),
            message_id: scalar(&["messageId"]),
            source_chain_selector: scalar(&["sourceChainSelector"]),
            destination_chain_selector: scalar(&["destinationChainSelector"]),
            created_at: now,
            updated_at: now,
        }
    }
}
