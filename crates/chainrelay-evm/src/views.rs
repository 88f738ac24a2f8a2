//! Zero-argument view functions, read by the contract monitor via `eth_call`.

use alloy_core::dyn_abi::DynSolType;
use alloy_dyn_abi::Specifier;
use alloy_json_abi::{JsonAbi, StateMutability};
use chainrelay_core::{error::DecodeError, types::{ArgType, NormalizedValue}};

use crate::{abi, fingerprint, normalizer};

/// A `view`/`pure` function taking no arguments, e.g. `totalSupply()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewFunction {
    pub name: String,
    /// First 4 bytes of keccak256(`name()`); the whole calldata
    pub selector: [u8; 4],
    pub outputs: Vec<ArgType>,
}

impl ViewFunction {
    pub fn new(name: impl Into<String>, outputs: Vec<ArgType>) -> Self {
        let name = name.into();
        let hash = fingerprint::keccak256_signature(&format!("{name}()"));
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&hash[..4]);
        Self {
            name,
            selector,
            outputs,
        }
    }

    /// Decode `eth_call` return data. Single outputs are unwrapped.
    pub fn decode_output(&self, data: &[u8]) -> Result<NormalizedValue, DecodeError> {
        let types: Vec<DynSolType> = self.outputs.iter().map(abi::dyn_type).collect();
        let decoded = DynSolType::Tuple(types)
            .abi_decode_params(data)
            .map_err(|e| DecodeError::AbiDecodeFailed {
                event: format!("{}()", self.name),
                reason: e.to_string(),
            })?;
        let mut values = match normalizer::normalize(decoded) {
            NormalizedValue::Array(vals) => vals,
            other => vec![other],
        };
        Ok(if values.len() == 1 {
            values.remove(0)
        } else {
            NormalizedValue::Array(values)
        })
    }
}

/// Every zero-argument `view`/`pure` function of `abi` whose outputs are
/// representable. Overloads with arguments are ignored.
pub fn view_functions(abi: &JsonAbi) -> Vec<ViewFunction> {
    abi.functions()
        .filter(|f| f.inputs.is_empty())
        .filter(|f| matches!(f.state_mutability, StateMutability::View | StateMutability::Pure))
        .filter_map(|f| {
            let outputs = f
                .outputs
                .iter()
                .map(|p| p.resolve().ok().and_then(|t| abi::arg_type_from_dyn(&t)))
                .collect::<Option<Vec<_>>>()?;
            Some(ViewFunction::new(f.name.clone(), outputs))
        })
        .collect()
}
