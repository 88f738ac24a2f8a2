//! `chainrelay decode-log`: decode and normalize one log without a node.

use alloy_primitives::{Address, Bytes, B256};
use anyhow::{anyhow, Context, Result};
use chainrelay_core::event::RawLog;
use chainrelay_evm::{abi, CallerConfig, EventDecoder, EventNormalizer};
use std::path::PathBuf;

pub struct DecodeArgs {
    pub abi: PathBuf,
    pub topics: Vec<String>,
    pub data: String,
    pub address: String,
    pub tx_hash: String,
    pub log_index: u64,
    pub block_number: u64,
    pub chain_id: u64,
}

pub fn run(args: DecodeArgs) -> Result<()> {
    let json = std::fs::read_to_string(&args.abi)
        .with_context(|| format!("reading {}", args.abi.display()))?;
    let name = args
        .abi
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("contract");
    let schema = abi::schema_from_json(name, &json)?;

    let topics = args
        .topics
        .iter()
        .map(|t| t.parse::<B256>().map_err(|e| anyhow!("invalid topic {t}: {e}")))
        .collect::<Result<Vec<_>>>()?;
    let raw = RawLog {
        address: args.address.parse::<Address>().context("invalid --address")?,
        topics,
        data: args.data.parse::<Bytes>().context("invalid --data hex")?,
        block_number: args.block_number,
        transaction_hash: args.tx_hash.parse::<B256>().context("invalid --tx-hash")?,
        log_index: args.log_index,
    };

    let decoded = EventDecoder.decode(&schema, &raw)?;
    let record = EventNormalizer::new(CallerConfig::default()).normalize(&raw, &decoded, args.chain_id);
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
