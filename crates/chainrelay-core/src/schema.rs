//! Interface schema: the in-memory form of a contract's event ABI.
//!
//! A schema is built once (usually from an ABI JSON file) and then shared
//! read-only behind an `Arc` by every decode task.

use alloy_primitives::B256;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::SchemaError;
use crate::types::ArgType;

/// One declared event argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgDef {
    /// Argument name; unnamed ABI arguments get `arg{i}`
    pub name: String,
    pub ty: ArgType,
    /// Stored in a topic rather than in the data payload
    pub indexed: bool,
}

impl ArgDef {
    pub fn new(name: impl Into<String>, ty: ArgType, indexed: bool) -> Self {
        Self {
            name: name.into(),
            ty,
            indexed,
        }
    }
}

/// One event of an interface schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDef {
    pub name: String,
    /// Arguments in declaration order
    pub inputs: Vec<ArgDef>,
    /// Anonymous events have no signature topic
    pub anonymous: bool,
    /// keccak256 of [`EventDef::signature`]; equals `topics[0]` of matching logs
    pub selector: B256,
}

impl EventDef {
    pub fn new(name: impl Into<String>, inputs: Vec<ArgDef>, anonymous: bool, selector: B256) -> Self {
        Self {
            name: name.into(),
            inputs,
            anonymous,
            selector,
        }
    }

    /// Canonical signature, e.g. `Transfer(address,address,uint256)`.
    pub fn signature(&self) -> String {
        let types: Vec<_> = self.inputs.iter().map(|a| a.ty.to_string()).collect();
        format!("{}({})", self.name, types.join(","))
    }

    /// Indexed arguments in declaration order (`topics[1..]`).
    pub fn indexed_args(&self) -> impl Iterator<Item = &ArgDef> {
        self.inputs.iter().filter(|a| a.indexed)
    }

    /// Non-indexed arguments in declaration order (the data payload).
    pub fn data_args(&self) -> impl Iterator<Item = &ArgDef> {
        self.inputs.iter().filter(|a| !a.indexed)
    }

    pub fn arg(&self, name: &str) -> Option<&ArgDef> {
        self.inputs.iter().find(|a| a.name == name)
    }
}

/// Summary row used by `check-config` style listings.
#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    pub name: String,
    pub signature: String,
    pub selector: String,
}

/// An ordered, immutable set of events for one contract type.
#[derive(Debug, Clone)]
pub struct InterfaceSchema {
    /// Contract type name, e.g. "Token"
    name: String,
    events: Vec<EventDef>,
    /// selector → index into `events`
    by_selector: HashMap<B256, usize>,
}

impl InterfaceSchema {
    /// Build a schema. Anonymous events are kept for completeness but are
    /// not addressable by selector.
    pub fn new(name: impl Into<String>, events: Vec<EventDef>) -> Result<Self, SchemaError> {
        let name = name.into();
        let mut by_selector = HashMap::new();
        for (idx, event) in events.iter().enumerate() {
            if event.anonymous {
                continue;
            }
            if let Some(prev) = by_selector.insert(event.selector, idx) {
                return Err(SchemaError::DuplicateEvent {
                    schema: name,
                    signature: format!("{} / {}", events[prev].signature(), event.signature()),
                });
            }
        }
        Ok(Self {
            name,
            events,
            by_selector,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an event by its signature hash (`topics[0]`).
    pub fn event_by_selector(&self, selector: &B256) -> Option<&EventDef> {
        self.by_selector.get(selector).map(|&idx| &self.events[idx])
    }

    /// First event with the given name (overloads resolve to the first declared).
    pub fn event_by_name(&self, name: &str) -> Option<&EventDef> {
        self.events.iter().find(|e| e.name == name)
    }

    pub fn events(&self) -> &[EventDef] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn summaries(&self) -> Vec<EventSummary> {
        self.events
            .iter()
            .filter(|e| !e.anonymous)
            .map(|e| EventSummary {
                name: e.name.clone(),
                signature: e.signature(),
                selector: format!("0x{}", hex::encode(e.selector)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mint() -> EventDef {
        EventDef::new(
            "Mint",
            vec![
                ArgDef::new("to", ArgType::Address, true),
                ArgDef::new("amount", ArgType::Uint(256), false),
            ],
            false,
            B256::repeat_byte(0x11),
        )
    }

    #[test]
    fn signature_and_partitions() {
        let ev = mint();
        assert_eq!(ev.signature(), "Mint(address,uint256)");
        assert_eq!(ev.indexed_args().count(), 1);
        assert_eq!(ev.data_args().next().unwrap().name, "amount");
    }

    #[test]
    fn lookup_by_selector() {
        let schema = InterfaceSchema::new("Token", vec![mint()]).unwrap();
        assert!(schema.event_by_selector(&B256::repeat_byte(0x11)).is_some());
        assert!(schema.event_by_selector(&B256::ZERO).is_none());
    }

    #[test]
    fn duplicate_selector_rejected() {
        let err = InterfaceSchema::new("Token", vec![mint(), mint()]).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateEvent { .. }));
    }

    #[test]
    fn anonymous_events_not_indexed() {
        let mut anon = mint();
        anon.anonymous = true;
        let schema = InterfaceSchema::new("Token", vec![anon]).unwrap();
        assert_eq!(schema.len(), 1);
        assert!(schema.event_by_selector(&B256::repeat_byte(0x11)).is_none());
    }
}
