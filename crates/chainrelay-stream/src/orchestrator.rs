//! `RetryOrchestrator`: supervised connect → subscribe → drain loop for one
//! (chain, contract) pair.
//!
//! ```text
//! Idle → Connecting → Subscribed ─(error)→ Failed → Connecting → …
//!             └──(connect/subscribe error)→ Failed ─(budget spent)→ Aborted
//! any state ─(cancel)→ Stopped
//! ```
//!
//! Every attempt uses a brand-new transport from the [`Connector`]; a stale
//! session is unsubscribed and dropped before the next attempt. Reaching
//! `Subscribed` resets the failure counter.

use chainrelay_core::{
    chain::ChainId,
    error::{StreamError, TransportError},
    transport::{Connector, LogFilter, LogSubscription, LogTransport, SubscriptionId},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::processor::LogProcessor;
use crate::retry::RetryPolicy;

/// Lifecycle of an orchestrator, published on a `watch` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    /// `attempt` is 1 + the current consecutive failure count
    Connecting { attempt: u32 },
    Subscribed,
    Failed { failures: u32 },
    Aborted,
    Stopped,
}

/// Why a drain loop ended.
enum DrainEnd {
    Cancelled,
    Dropped(TransportError),
}

pub struct RetryOrchestrator {
    chain: ChainId,
    filter: LogFilter,
    connector: Arc<dyn Connector>,
    processor: Arc<LogProcessor>,
    policy: RetryPolicy,
    in_flight: Arc<Semaphore>,
    subscribe_timeout: Duration,
    state: watch::Sender<OrchestratorState>,
}

impl RetryOrchestrator {
    pub fn new(
        chain: ChainId,
        filter: LogFilter,
        connector: Arc<dyn Connector>,
        processor: Arc<LogProcessor>,
        policy: RetryPolicy,
        in_flight: Arc<Semaphore>,
    ) -> Self {
        let (state, _) = watch::channel(OrchestratorState::Idle);
        Self {
            chain,
            filter,
            connector,
            processor,
            policy,
            in_flight,
            subscribe_timeout: Duration::from_secs(15),
            state,
        }
    }

    pub fn with_subscribe_timeout(mut self, timeout: Duration) -> Self {
        self.subscribe_timeout = timeout;
        self
    }

    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<OrchestratorState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: OrchestratorState) {
        self.state.send_replace(state);
    }

    /// Run until cancelled (`Ok`) or until `max_attempts` consecutive
    /// failures (`Err(StreamError::Aborted)`).
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), StreamError> {
        let contract = self.processor.contract().to_string();
        let mut failures = 0u32;

        loop {
            let attempt = failures + 1;
            self.set_state(OrchestratorState::Connecting { attempt });
            debug!(chain = %self.chain, contract = %contract, attempt, "connecting");

            let established = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.stopped();
                    return Ok(());
                }
                r = self.establish() => r,
            };

            let failure = match established {
                Ok((transport, subscription)) => {
                    failures = 0;
                    self.set_state(OrchestratorState::Subscribed);
                    info!(
                        chain = %self.chain,
                        contract = %contract,
                        subscription = %subscription.id,
                        "subscribed to logs"
                    );
                    match self.drain(transport, subscription, &cancel).await {
                        DrainEnd::Cancelled => {
                            self.stopped();
                            return Ok(());
                        }
                        DrainEnd::Dropped(e) => StreamError::SubscriptionDropped(e),
                    }
                }
                Err(e) => e,
            };

            failures += 1;
            self.processor.metrics().record_reconnect();
            self.set_state(OrchestratorState::Failed { failures });

            if self.policy.is_exhausted(failures) {
                self.set_state(OrchestratorState::Aborted);
                error!(
                    chain = %self.chain,
                    contract = %contract,
                    attempts = failures,
                    "giving up: {failure}"
                );
                return Err(StreamError::Aborted {
                    attempts: failures,
                    last_error: failure.to_string(),
                });
            }

            let delay = self.policy.next_delay(failures).unwrap_or_default();
            warn!(
                chain = %self.chain,
                contract = %contract,
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                "stream failed, reconnecting: {failure}"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.stopped();
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn stopped(&self) {
        self.set_state(OrchestratorState::Stopped);
        info!(chain = %self.chain, contract = %self.processor.contract(), "stopped");
    }

    /// Open a fresh session and register the log subscription on it.
    async fn establish(&self) -> Result<(Arc<dyn LogTransport>, LogSubscription), StreamError> {
        let transport = self.connector.connect(&self.chain).await?;
        let subscribe = transport.subscribe_logs(&self.filter);
        match tokio::time::timeout(self.subscribe_timeout, subscribe).await {
            Ok(Ok(subscription)) => Ok((transport, subscription)),
            Ok(Err(e)) => Err(StreamError::SubscriptionFailed(e)),
            Err(_) => Err(StreamError::SubscriptionFailed(TransportError::Timeout {
                ms: self.subscribe_timeout.as_millis() as u64,
            })),
        }
    }

    /// Hand every incoming log to a bounded processing task until the
    /// subscription dies or `cancel` fires. Always releases the subscription.
    async fn drain(
        &self,
        transport: Arc<dyn LogTransport>,
        subscription: LogSubscription,
        cancel: &CancellationToken,
    ) -> DrainEnd {
        let LogSubscription {
            id,
            mut logs,
            mut errors,
        } = subscription;

        let end = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break DrainEnd::Cancelled,
                next = logs.recv() => {
                    let Some(raw) = next else {
                        break DrainEnd::Dropped(errors.try_recv().unwrap_or(TransportError::Closed));
                    };
                    // waits here when max_in_flight tasks are running
                    let permit = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break DrainEnd::Cancelled,
                        p = self.in_flight.clone().acquire_owned() => match p {
                            Ok(p) => p,
                            Err(_) => break DrainEnd::Cancelled,
                        },
                    };
                    let processor = Arc::clone(&self.processor);
                    let session = Arc::clone(&transport);
                    tokio::spawn(async move {
                        let _permit = permit;
                        processor.process(raw, Some(session)).await;
                    });
                }
                err = errors.recv() => break DrainEnd::Dropped(err.unwrap_or(TransportError::Closed)),
            }
        };

        self.release(transport.as_ref(), &id).await;
        end
    }

    async fn release(&self, transport: &dyn LogTransport, id: &SubscriptionId) {
        match tokio::time::timeout(self.subscribe_timeout, transport.unsubscribe(id)).await {
            Ok(Ok(acknowledged)) => {
                debug!(chain = %self.chain, subscription = %id, acknowledged, "unsubscribed")
            }
            Ok(Err(e)) => debug!(chain = %self.chain, subscription = %id, "unsubscribe failed: {e}"),
            Err(_) => debug!(chain = %self.chain, subscription = %id, "unsubscribe timed out"),
        }
    }
}
