//! EVM event signature hashing.
//!
//! The signature hash of an event is the keccak256 of its canonical
//! signature string, e.g.:
//!   keccak256("Transfer(address,address,uint256)")
//!   → 0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef
//!
//! For raw logs, topics[0] is the signature hash and is never recomputed.

use alloy_primitives::B256;
use tiny_keccak::{Hasher, Keccak};

/// Compute the keccak256 hash of an event signature string.
/// Input: the canonical ABI signature, `"EventName(type1,type2,...)"`.
pub fn keccak256_signature(signature: &str) -> B256 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(signature.as_bytes());
    hasher.finalize(&mut output);
    B256::from(output)
}

/// Lowercase `0x` hex of a selector, as used in log fields and filters.
pub fn selector_hex(selector: &B256) -> String {
    format!("0x{}", hex::encode(selector))
}

/// Parse a `0x`-prefixed 32-byte hex topic.
/// Returns `None` if the string is not exactly 64 hex digits.
pub fn parse_topic(topic: &str) -> Option<B256> {
    let hex = topic.strip_prefix("0x").unwrap_or(topic);
    if hex.len() != 64 {
        return None;
    }
    let bytes = hex::decode(hex).ok()?;
    Some(B256::from_slice(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erc20_transfer_hash() {
        let h = keccak256_signature("Transfer(address,address,uint256)");
        assert_eq!(
            selector_hex(&h),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn uniswap_v3_swap_hash() {
        let h = keccak256_signature("Swap(address,address,int256,int256,uint160,uint128,int24)");
        assert_eq!(
            selector_hex(&h),
            "0xc42079f94a6350d7e6235f29174924f928cc2ac818eb64fed8004e115fbcca67"
        );
    }

    #[test]
    fn parse_topic_valid_and_invalid() {
        let t = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
        assert_eq!(parse_topic(t), Some(keccak256_signature("Transfer(address,address,uint256)")));
        assert!(parse_topic("0x1234").is_none());
        assert!(parse_topic(&format!("0x{}", "zz".repeat(32))).is_none());
    }
}
