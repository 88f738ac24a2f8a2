//! # chainrelay-evm
//!
//! EVM event decoding for ChainRelay.
//!
//! ## Implementation notes
//! - Uses `alloy-core` for ABI decode
//! - Topics[0] → event signature hash (keccak256)
//! - Topics[1..] → indexed parameters (each 32 bytes)
//! - `data` → non-indexed parameters (ABI-encoded parameter sequence)

pub mod abi;
pub mod decoder;
pub mod fingerprint;
pub mod normalizer;
pub mod registry;
pub mod views;

pub use decoder::EventDecoder;
pub use normalizer::{CallerConfig, CallerStrategy, EventNormalizer};
pub use registry::{ContractEntry, ContractRegistry};
pub use views::ViewFunction;
