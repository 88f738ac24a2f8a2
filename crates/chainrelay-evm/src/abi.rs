//! ABI JSON → [`InterfaceSchema`].
//!
//! Accepts the standard Ethereum ABI JSON array, or a compiler artifact
//! object carrying it under an `abi` key (Hardhat/Foundry output).

use std::collections::HashSet;

use alloy_core::dyn_abi::DynSolType;
use alloy_dyn_abi::Specifier;
use alloy_json_abi::{Event, JsonAbi};
use chainrelay_core::{
    error::SchemaError,
    schema::{ArgDef, EventDef, InterfaceSchema},
    types::ArgType,
};

use crate::fingerprint;

/// Parse ABI JSON text in either array or artifact form.
pub fn parse_abi_json(json: &str) -> Result<JsonAbi, SchemaError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| SchemaError::InvalidAbi {
            reason: e.to_string(),
        })?;
    let abi = match value {
        serde_json::Value::Object(mut obj) => obj.remove("abi").ok_or_else(|| {
            SchemaError::InvalidAbi {
                reason: "object has no `abi` key".into(),
            }
        })?,
        other => other,
    };
    serde_json::from_value(abi).map_err(|e| SchemaError::InvalidAbi {
        reason: e.to_string(),
    })
}

/// Build an interface schema from ABI JSON text.
pub fn schema_from_json(name: &str, json: &str) -> Result<InterfaceSchema, SchemaError> {
    let abi = parse_abi_json(json)?;
    schema_from_abi(name, &abi)
}

/// Build an interface schema from every event declared in `abi`.
pub fn schema_from_abi(name: &str, abi: &JsonAbi) -> Result<InterfaceSchema, SchemaError> {
    let events = abi
        .events()
        .map(event_def)
        .collect::<Result<Vec<_>, _>>()?;
    InterfaceSchema::new(name, events)
}

fn event_def(event: &Event) -> Result<EventDef, SchemaError> {
    let mut declared = HashSet::new();
    for param in event.inputs.iter().filter(|p| !p.name.is_empty()) {
        if !declared.insert(param.name.as_str()) {
            return Err(SchemaError::InvalidAbi {
                reason: format!("event {} declares argument '{}' twice", event.name, param.name),
            });
        }
    }

    let mut inputs = Vec::with_capacity(event.inputs.len());
    for (i, param) in event.inputs.iter().enumerate() {
        let resolved = param.resolve().map_err(|e| SchemaError::UnsupportedType {
            event: event.name.clone(),
            ty: format!("{} ({e})", param.ty),
        })?;
        let ty = arg_type_from_dyn(&resolved).ok_or_else(|| SchemaError::UnsupportedType {
            event: event.name.clone(),
            ty: param.ty.clone(),
        })?;
        let name = if param.name.is_empty() {
            positional_name(i, &declared)
        } else {
            param.name.clone()
        };
        inputs.push(ArgDef::new(name, ty, param.indexed));
    }

    let mut def = EventDef::new(event.name.clone(), inputs, event.anonymous, Default::default());
    def.selector = fingerprint::keccak256_signature(&def.signature());
    Ok(def)
}

/// `arg{i}` for an unnamed argument, prefixed with `_` until it no longer
/// shadows a declared name.
fn positional_name(i: usize, declared: &HashSet<&str>) -> String {
    let mut name = format!("arg{i}");
    while declared.contains(name.as_str()) {
        name.insert(0, '_');
    }
    name
}

/// Map an alloy type onto the schema type model.
/// Returns `None` for types events cannot carry (`function`).
pub fn arg_type_from_dyn(ty: &DynSolType) -> Option<ArgType> {
    Some(match ty {
        DynSolType::Address => ArgType::Address,
        DynSolType::Bool => ArgType::Bool,
        DynSolType::Uint(bits) => ArgType::Uint(*bits as u16),
        DynSolType::Int(bits) => ArgType::Int(*bits as u16),
        DynSolType::FixedBytes(n) => ArgType::FixedBytes(*n as u8),
        DynSolType::Bytes => ArgType::Bytes,
        DynSolType::String => ArgType::String,
        DynSolType::Array(inner) => ArgType::Array(Box::new(arg_type_from_dyn(inner)?)),
        DynSolType::FixedArray(inner, len) => {
            ArgType::FixedArray(Box::new(arg_type_from_dyn(inner)?), *len)
        }
        DynSolType::Tuple(elems) => ArgType::Tuple(
            elems
                .iter()
                .map(arg_type_from_dyn)
                .collect::<Option<Vec<_>>>()?,
        ),
        _ => return None,
    })
}

/// Inverse of [`arg_type_from_dyn`], used to drive the ABI data decoder.
pub fn dyn_type(ty: &ArgType) -> DynSolType {
    match ty {
        ArgType::Address => DynSolType::Address,
        ArgType::Bool => DynSolType::Bool,
        ArgType::Uint(bits) => DynSolType::Uint(*bits as usize),
        ArgType::Int(bits) => DynSolType::Int(*bits as usize),
        ArgType::FixedBytes(n) => DynSolType::FixedBytes(*n as usize),
        ArgType::Bytes => DynSolType::Bytes,
        ArgType::String => DynSolType::String,
        ArgType::Array(inner) => DynSolType::Array(Box::new(dyn_type(inner))),
        ArgType::FixedArray(inner, len) => DynSolType::FixedArray(Box::new(dyn_type(inner)), *len),
        ArgType::Tuple(elems) => DynSolType::Tuple(elems.iter().map(dyn_type).collect()),
    }
}
