//! `EventDecoder`: schema-driven decoding of raw EVM logs.

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{I256, U256};
use chainrelay_core::{
    error::DecodeError,
    event::{DecodedEvent, RawLog},
    schema::{EventDef, InterfaceSchema},
    types::{ArgType, NormalizedValue},
};
use indexmap::IndexMap;

use crate::{abi, fingerprint, normalizer};

/// The EVM log decoder.
/// Stateless; the schema is passed per call so one decoder serves every contract.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventDecoder;

impl EventDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode one raw log against `schema`.
    ///
    /// Fields come out in declaration order: indexed arguments consume
    /// `topics[1..]`, the rest are unpacked from `data`.
    pub fn decode(
        &self,
        schema: &InterfaceSchema,
        raw: &RawLog,
    ) -> Result<DecodedEvent, DecodeError> {
        let selector = raw.signature().ok_or(DecodeError::NoTopics)?;
        let event = schema
            .event_by_selector(selector)
            .ok_or_else(|| DecodeError::UnknownEvent {
                signature: fingerprint::selector_hex(selector),
            })?;

        let indexed = event.indexed_args().count();
        let available = raw.topics.len() - 1;
        if available < indexed {
            return Err(DecodeError::MissingTopic {
                event: event.name.clone(),
                expected: indexed,
                got: available,
            });
        }

        let mut data_values = self.decode_data(event, &raw.data)?.into_iter();
        let mut topics = raw.topics[1..].iter();

        let mut fields = IndexMap::with_capacity(event.inputs.len());
        for arg in &event.inputs {
            let value = if arg.indexed {
                match topics.next() {
                    Some(topic) => decode_topic(topic.as_slice(), &arg.ty),
                    None => {
                        return Err(DecodeError::MissingTopic {
                            event: event.name.clone(),
                            expected: indexed,
                            got: available,
                        })
                    }
                }
            } else {
                match data_values.next() {
                    Some(v) => normalizer::normalize(v),
                    None => {
                        return Err(DecodeError::AbiDecodeFailed {
                            event: event.name.clone(),
                            reason: format!("no data value for argument '{}'", arg.name),
                        })
                    }
                }
            };
            fields.insert(arg.name.clone(), value);
        }

        Ok(DecodedEvent {
            name: event.name.clone(),
            fields,
        })
    }

    /// Decode the non-indexed parameters as one ABI parameter sequence.
    fn decode_data(&self, event: &EventDef, data: &[u8]) -> Result<Vec<DynSolValue>, DecodeError> {
        let types: Vec<DynSolType> = event.data_args().map(|a| abi::dyn_type(&a.ty)).collect();
        if types.is_empty() {
            return Ok(Vec::new());
        }

        let decoded = DynSolType::Tuple(types)
            .abi_decode_params(data)
            .map_err(|e| DecodeError::AbiDecodeFailed {
                event: event.name.clone(),
                reason: e.to_string(),
            })?;

        Ok(match decoded {
            DynSolValue::Tuple(vals) => vals,
            other => vec![other],
        })
    }
}

/// Decode a single indexed topic (always 32 bytes).
///
/// # EVM indexed-parameter encoding
/// - Address and integer types are left-padded / sign-extended words and are
///   recovered as values.
/// - Reference types (string, bytes, arrays, tuples) are stored as the keccak256
///   of their encoding; the value is unrecoverable and the raw hash is returned.
/// - Bool and fixed bytes are returned as the raw topic hex.
pub fn decode_topic(topic: &[u8], ty: &ArgType) -> NormalizedValue {
    match ty {
        ArgType::Address => NormalizedValue::address_from_slice(topic),
        ArgType::Uint(_) => NormalizedValue::Uint(U256::from_be_slice(topic).to_string()),
        ArgType::Int(_) => {
            NormalizedValue::Int(I256::from_raw(U256::from_be_slice(topic)).to_string())
        }
        ArgType::Bool
        | ArgType::FixedBytes(_)
        | ArgType::Bytes
        | ArgType::String
        | ArgType::Array(_)
        | ArgType::FixedArray(..)
        | ArgType::Tuple(_) => NormalizedValue::bytes_from_slice(topic),
    }
}
