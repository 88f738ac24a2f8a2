//! `ContractMonitor`: periodic reads of zero-argument view functions
//! (`name`, `symbol`, `totalSupply`, …) via `eth_call`.
//!
//! Each round opens its own session through the [`Connector`], so the
//! monitor never shares a socket with a log subscription. Results are
//! logged only.

use alloy_primitives::{Address, Bytes};
use chainrelay_core::{
    chain::ChainId,
    transport::{Connector, LogTransport},
    types::NormalizedValue,
};
use chainrelay_evm::ViewFunction;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of one view-function read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewReading {
    pub function: String,
    pub value: Result<NormalizedValue, String>,
}

pub struct ContractMonitor {
    chain: ChainId,
    contract: String,
    address: Address,
    functions: Vec<ViewFunction>,
    connector: Arc<dyn Connector>,
    interval: Duration,
    retry_delay: Duration,
}

impl ContractMonitor {
    pub fn new(
        chain: ChainId,
        contract: impl Into<String>,
        address: Address,
        functions: Vec<ViewFunction>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            chain,
            contract: contract.into(),
            address,
            functions,
            connector,
            interval: Duration::from_secs(60),
            retry_delay: Duration::from_secs(5),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn functions(&self) -> &[ViewFunction] {
        &self.functions
    }

    /// Poll until cancelled. Connection failures are logged and retried
    /// after `retry_delay`; they never stop the monitor.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            chain = %self.chain,
            contract = %self.contract,
            functions = self.functions.len(),
            interval_secs = self.interval.as_secs(),
            "contract monitor started"
        );
        loop {
            let connected = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                c = self.connector.connect(&self.chain) => c,
            };

            let wait = match connected {
                Ok(transport) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        readings = self.read_all(transport.as_ref()) => self.report(&readings),
                    }
                    self.interval
                }
                Err(e) => {
                    warn!(chain = %self.chain, contract = %self.contract, "monitor connect failed: {e}");
                    self.retry_delay
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }
        debug!(chain = %self.chain, contract = %self.contract, "contract monitor stopped");
    }

    /// Read every configured function once over `transport`.
    pub async fn read_all(&self, transport: &dyn LogTransport) -> Vec<ViewReading> {
        let mut readings = Vec::with_capacity(self.functions.len());
        for function in &self.functions {
            let calldata = Bytes::copy_from_slice(&function.selector);
            let value = match transport.call(&self.address, &calldata).await {
                Ok(output) => function.decode_output(&output).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            readings.push(ViewReading {
                function: function.name.clone(),
                value,
            });
        }
        readings
    }

    fn report(&self, readings: &[ViewReading]) {
        for reading in readings {
            match &reading.value {
                Ok(value) => info!(
                    chain = %self.chain,
                    contract = %self.contract,
                    function = %reading.function,
                    value = %value,
                    "contract state"
                ),
                Err(e) => warn!(
                    chain = %self.chain,
                    contract = %self.contract,
                    function = %reading.function,
                    "view call failed: {e}"
                ),
            }
        }
    }
}
