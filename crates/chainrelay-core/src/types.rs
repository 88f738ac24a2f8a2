//! Argument type model and normalized value representation.
//!
//! Every argument declared in an interface schema carries an [`ArgType`].
//! Decoding dispatches exhaustively on it, so there are no runtime type
//! assertions anywhere in the pipeline. Decoded values come out as
//! [`NormalizedValue`]s, which are string-first: integers are decimal strings
//! so 256-bit values survive JSON consumers without precision loss.

use serde::{Serialize, Serializer};
use std::fmt;

/// The type of a single event argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgType {
    /// 20-byte account or contract address
    Address,
    /// Unsigned integer; width in bits (8..=256)
    Uint(u16),
    /// Signed two's-complement integer; width in bits (8..=256)
    Int(u16),
    Bool,
    /// `bytes1` .. `bytes32`; length in bytes
    FixedBytes(u8),
    /// Dynamic `bytes`
    Bytes,
    /// Dynamic UTF-8 `string`
    String,
    /// `T[]`
    Array(Box<ArgType>),
    /// `T[n]`
    FixedArray(Box<ArgType>, usize),
    /// `(T1,T2,...)`
    Tuple(Vec<ArgType>),
}

impl fmt::Display for ArgType {
    /// Canonical ABI spelling, as used in event signatures.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgType::Address => write!(f, "address"),
            ArgType::Uint(bits) => write!(f, "uint{bits}"),
            ArgType::Int(bits) => write!(f, "int{bits}"),
            ArgType::Bool => write!(f, "bool"),
            ArgType::FixedBytes(n) => write!(f, "bytes{n}"),
            ArgType::Bytes => write!(f, "bytes"),
            ArgType::String => write!(f, "string"),
            ArgType::Array(elem) => write!(f, "{elem}[]"),
            ArgType::FixedArray(elem, len) => write!(f, "{elem}[{len}]"),
            ArgType::Tuple(elems) => {
                let parts: Vec<_> = elems.iter().map(|t| t.to_string()).collect();
                write!(f, "({})", parts.join(","))
            }
        }
    }
}

/// A decoded, type-normalized argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedValue {
    /// Lowercase `0x`-prefixed 20-byte hex
    Address(String),
    /// Decimal string
    Uint(String),
    /// Decimal string, `-` prefixed when negative
    Int(String),
    Bool(bool),
    /// `0x`-prefixed hex
    Bytes(String),
    Str(String),
    Array(Vec<NormalizedValue>),
}

impl NormalizedValue {
    /// Build an address value from raw bytes (right-most 20 bytes are used).
    pub fn address_from_slice(bytes: &[u8]) -> Self {
        let start = bytes.len().saturating_sub(20);
        NormalizedValue::Address(format!("0x{}", hex::encode(&bytes[start..])))
    }

    pub fn bytes_from_slice(bytes: &[u8]) -> Self {
        NormalizedValue::Bytes(format!("0x{}", hex::encode(bytes)))
    }

    /// Returns the inner string if this is an Address value.
    pub fn as_address(&self) -> Option<&str> {
        match self {
            NormalizedValue::Address(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the scalar rendering used for record fields (`amount`, `to`, ...).
    /// `None` for arrays and tuples.
    pub fn as_scalar(&self) -> Option<String> {
        match self {
            NormalizedValue::Array(_) => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedValue::Address(s)
            | NormalizedValue::Uint(s)
            | NormalizedValue::Int(s)
            | NormalizedValue::Bytes(s)
            | NormalizedValue::Str(s) => write!(f, "{s}"),
            NormalizedValue::Bool(b) => write!(f, "{b}"),
            NormalizedValue::Array(items) => {
                let parts: Vec<_> = items.iter().map(|x| x.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl Serialize for NormalizedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            NormalizedValue::Address(s)
            | NormalizedValue::Uint(s)
            | NormalizedValue::Int(s)
            | NormalizedValue::Bytes(s)
            | NormalizedValue::Str(s) => serializer.serialize_str(s),
            NormalizedValue::Bool(b) => serializer.serialize_bool(*b),
            NormalizedValue::Array(items) => items.serialize(serializer),
        }
    }
}
