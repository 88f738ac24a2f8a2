//! Chain identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An EVM chain the relay subscribes to, e.g. `polygon-amoy` / `80002`.
///
/// The numeric id is what ends up in every `NormalizedRecord`; the slug is
/// only used for logs and configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId {
    /// Human-readable slug, e.g. "ethereum", "polygon-amoy"
    pub slug: String,
    /// EIP-155 chain id (e.g. 1 for Ethereum mainnet)
    pub chain_id: u64,
}

impl ChainId {
    pub fn new(slug: impl Into<String>, chain_id: u64) -> Self {
        Self {
            slug: slug.into(),
            chain_id,
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.slug, self.chain_id)
    }
}
