//! `ContractRegistry`: loads contract ABIs and address books from disk.
//!
//! One entry per contract type: an interface schema (shared behind `Arc`)
//! plus the deployment address of that contract on each chain. Address books
//! are JSON objects keyed by decimal chain id:
//!
//! ```json
//! { "80002": "0x5FbDB2315678afecb367f032d93F642f64180aa3" }
//! ```

use alloy_primitives::Address;
use chainrelay_core::{error::SchemaError, schema::InterfaceSchema};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::abi;
use crate::views::{self, ViewFunction};

/// A contract type: its schema and where it is deployed.
#[derive(Debug, Clone)]
pub struct ContractEntry {
    pub schema: Arc<InterfaceSchema>,
    /// chain id → deployment address
    pub addresses: BTreeMap<u64, Address>,
    /// Zero-argument view functions, for the contract monitor
    pub views: Vec<ViewFunction>,
}

impl ContractEntry {
    pub fn address_on(&self, chain_id: u64) -> Option<Address> {
        self.addresses.get(&chain_id).copied()
    }

    pub fn view(&self, name: &str) -> Option<&ViewFunction> {
        self.views.iter().find(|v| v.name == name)
    }
}

/// In-memory contract registry. Built once at startup, read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct ContractRegistry {
    contracts: IndexMap<String, ContractEntry>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a contract type from an already-built schema.
    pub fn insert(
        &mut self,
        schema: InterfaceSchema,
        addresses: BTreeMap<u64, Address>,
        views: Vec<ViewFunction>,
    ) {
        let name = schema.name().to_string();
        self.contracts.insert(
            name,
            ContractEntry {
                schema: Arc::new(schema),
                addresses,
                views,
            },
        );
    }

    /// Load a contract type from an ABI file and an address-book file.
    pub fn load_files(
        &mut self,
        name: &str,
        abi_path: &Path,
        addresses_path: &Path,
    ) -> Result<&ContractEntry, SchemaError> {
        let json_abi = abi::parse_abi_json(&read(abi_path)?)?;
        let schema = abi::schema_from_abi(name, &json_abi)?;
        let views = views::view_functions(&json_abi);
        let addresses = parse_address_book(&read(addresses_path)?)?;
        tracing::debug!(
            contract = name,
            events = schema.len(),
            views = views.len(),
            chains = addresses.len(),
            "loaded contract"
        );
        self.insert(schema, addresses, views);
        self.get(name).ok_or_else(|| SchemaError::NotFound { name: name.into() })
    }

    pub fn get(&self, name: &str) -> Option<&ContractEntry> {
        self.contracts.get(name)
    }

    /// Shared schema handle for `name`.
    pub fn schema(&self, name: &str) -> Result<Arc<InterfaceSchema>, SchemaError> {
        self.get(name)
            .map(|e| Arc::clone(&e.schema))
            .ok_or_else(|| SchemaError::NotFound { name: name.into() })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.contracts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

fn read(path: &Path) -> Result<String, SchemaError> {
    std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Parse an address book `{ "<chain id>": "0x<address>" }`.
pub fn parse_address_book(json: &str) -> Result<BTreeMap<u64, Address>, SchemaError> {
    let raw: BTreeMap<String, String> =
        serde_json::from_str(json).map_err(|e| SchemaError::InvalidAddressBook {
            reason: e.to_string(),
        })?;

    let mut out = BTreeMap::new();
    for (chain, addr) in raw {
        let chain_id: u64 = chain.trim().parse().map_err(|_| SchemaError::InvalidAddressBook {
            reason: format!("chain id '{chain}' is not a decimal integer"),
        })?;
        let address: Address = addr.trim().parse().map_err(|e| SchemaError::InvalidAddressBook {
            reason: format!("address '{addr}' for chain {chain_id}: {e}"),
        })?;
        out.insert(chain_id, address);
    }
    Ok(out)
}
