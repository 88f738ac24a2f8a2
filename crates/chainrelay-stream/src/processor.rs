//! `LogProcessor`: decode → normalize → forward for a single log.
//!
//! Failures here are local to the log. They are logged and counted and never
//! reach the orchestrator.

use chainrelay_core::{
    chain::ChainId, event::RawLog, schema::InterfaceSchema, transport::LogTransport,
};
use chainrelay_evm::{EventDecoder, EventNormalizer};
use chainrelay_forward::{Ack, Forwarder};
use chainrelay_observability::RelayMetrics;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// What happened to one log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutcome {
    /// Delivered; carries the record id
    Forwarded { id: String, status: u16 },
    /// Decoded but no sink endpoint is configured for the event
    NoEndpoint { id: String },
    /// The contract emitted an event the schema does not track
    Unknown,
    /// The log matched a known event but could not be decoded
    DecodeFailed,
    /// The sink rejected the record or could not be reached
    ForwardFailed { id: String },
}

/// Per-(chain, contract) pipeline for incoming logs. Cheap to share behind `Arc`.
pub struct LogProcessor {
    chain: ChainId,
    contract: String,
    schema: Arc<InterfaceSchema>,
    decoder: EventDecoder,
    normalizer: EventNormalizer,
    forwarder: Arc<dyn Forwarder>,
    metrics: Arc<RelayMetrics>,
    enrich_transactions: bool,
}

impl LogProcessor {
    pub fn new(
        chain: ChainId,
        contract: impl Into<String>,
        schema: Arc<InterfaceSchema>,
        normalizer: EventNormalizer,
        forwarder: Arc<dyn Forwarder>,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            chain,
            contract: contract.into(),
            schema,
            decoder: EventDecoder,
            normalizer,
            forwarder,
            metrics,
            enrich_transactions: false,
        }
    }

    /// Look up the emitting transaction of every decoded log (debug output only).
    pub fn with_enrichment(mut self, enabled: bool) -> Self {
        self.enrich_transactions = enabled;
        self
    }

    pub fn chain(&self) -> &ChainId {
        &self.chain
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn metrics(&self) -> &Arc<RelayMetrics> {
        &self.metrics
    }

    /// Run one log through the pipeline. `transport` is the session the log
    /// arrived on, used for enrichment lookups.
    pub async fn process(&self, raw: RawLog, transport: Option<Arc<dyn LogTransport>>) -> LogOutcome {
        let started = Instant::now();
        self.metrics.record_received();
        let outcome = self.run(raw, transport).await;
        self.metrics.record_latency(started.elapsed());
        outcome
    }

    async fn run(&self, raw: RawLog, transport: Option<Arc<dyn LogTransport>>) -> LogOutcome {
        let tx_hash = raw.transaction_hash_hex();

        let decoded = match self.decoder.decode(&self.schema, &raw) {
            Ok(d) => d,
            Err(e) if e.is_unknown_event() => {
                debug!(
                    chain = %self.chain,
                    contract = %self.contract,
                    tx_hash = %tx_hash,
                    log_index = raw.log_index,
                    "skipping log: {e}"
                );
                self.metrics.record_unknown();
                return LogOutcome::Unknown;
            }
            Err(e) => {
                warn!(
                    chain = %self.chain,
                    contract = %self.contract,
                    tx_hash = %tx_hash,
                    log_index = raw.log_index,
                    "decode failed: {e}"
                );
                self.metrics.record_decode_error();
                return LogOutcome::DecodeFailed;
            }
        };
        self.metrics.record_decoded();

        if self.enrich_transactions {
            if let Some(transport) = transport {
                self.enrich(transport.as_ref(), &raw, &decoded.name).await;
            }
        }

        let record = self.normalizer.normalize(&raw, &decoded, self.chain.chain_id);
        match self.forwarder.forward(&record).await {
            Ok(Ack::Delivered { status }) => {
                self.metrics.record_forwarded();
                debug!(
                    chain = %self.chain,
                    event = %record.event_name,
                    id = %record.id,
                    block = record.block_number,
                    "event relayed"
                );
                LogOutcome::Forwarded { id: record.id, status }
            }
            Ok(Ack::Skipped) => {
                self.metrics.record_forward_skipped();
                LogOutcome::NoEndpoint { id: record.id }
            }
            Err(e) => {
                self.metrics.record_forward_error();
                warn!(
                    chain = %self.chain,
                    event = %record.event_name,
                    id = %record.id,
                    tx_hash = %tx_hash,
                    "forward failed: {e}"
                );
                LogOutcome::ForwardFailed { id: record.id }
            }
        }
    }

    async fn enrich(&self, transport: &dyn LogTransport, raw: &RawLog, event: &str) {
        match transport.transaction_by_hash(&raw.transaction_hash).await {
            Ok(Some(tx)) => debug!(
                chain = %self.chain,
                event,
                tx_hash = %raw.transaction_hash_hex(),
                from = ?tx.from,
                to = ?tx.to,
                nonce = %tx.nonce,
                gas_price = ?tx.gas_price,
                value = %tx.value,
                input_len = tx.input.len(),
                "transaction details"
            ),
            Ok(None) => debug!(
                chain = %self.chain,
                tx_hash = %raw.transaction_hash_hex(),
                "transaction not found"
            ),
            Err(e) => debug!(
                chain = %self.chain,
                tx_hash = %raw.transaction_hash_hex(),
                "transaction lookup failed: {e}"
            ),
        }
    }
}
