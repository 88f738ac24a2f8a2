//! `Relay`: the composition root.
//!
//! Builds the shared [`RelayContext`] and runs one [`RetryOrchestrator`] per
//! (chain, contract) pair. If any orchestrator aborts, the whole relay is
//! cancelled and [`Relay::run`] reports the failure. Shutdown waits for
//! in-flight log tasks before returning.

use alloy_primitives::Address;
use chainrelay_core::{
    chain::ChainId,
    error::{ForwardError, SchemaError, StreamError},
    transport::{Connector, LogFilter},
};
use chainrelay_evm::{CallerConfig, ContractRegistry, EventNormalizer};
use chainrelay_forward::{Forwarder, HttpForwarder};
use chainrelay_observability::RelayMetrics;
use chainrelay_ws::{WsConfig, WsConnector};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{ConfigError, RelayConfig};
use crate::monitor::ContractMonitor;
use crate::orchestrator::RetryOrchestrator;
use crate::processor::LogProcessor;
use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("contract {contract} has no event named '{event}'")]
    UnknownEvent { contract: String, event: String },

    #[error("no configured contract is deployed on any configured chain")]
    NothingToWatch,

    #[error("{chain}/{contract}: {source}")]
    Stream {
        chain: String,
        contract: String,
        #[source]
        source: StreamError,
    },

    #[error("orchestrator task failed: {0}")]
    Task(String),
}

/// Collaborators shared by every orchestrator of a relay.
#[derive(Clone)]
pub struct RelayContext {
    pub metrics: Arc<RelayMetrics>,
    pub connector: Arc<dyn Connector>,
    pub forwarder: Arc<dyn Forwarder>,
    pub registry: Arc<ContractRegistry>,
}

/// One resolved (chain, contract) subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSpec {
    pub chain: ChainId,
    pub contract: String,
    pub filter: LogFilter,
    /// Event names behind `filter.signatures`; empty = every event
    pub events: Vec<String>,
    pub caller: CallerConfig,
}

impl SubscriptionSpec {
    pub fn address(&self) -> Address {
        self.filter.address
    }
}

impl fmt::Display for SubscriptionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} @ 0x{}", self.chain, self.contract, hex::encode(self.filter.address))?;
        if self.events.is_empty() {
            write!(f, " [all events]")
        } else {
            write!(f, " [{}]", self.events.join(", "))
        }
    }
}

/// Load every configured contract's ABI and address book.
pub fn load_registry(config: &RelayConfig) -> Result<ContractRegistry, RelayError> {
    let mut registry = ContractRegistry::new();
    for contract in &config.contracts {
        registry.load_files(
            &contract.name,
            &config.resolve_path(&contract.abi),
            &config.resolve_path(&contract.addresses),
        )?;
    }
    Ok(registry)
}

/// Resolve the (chain, contract) pairs to watch. Contracts without an
/// address on a chain are skipped for that chain.
pub fn plan(config: &RelayConfig, registry: &ContractRegistry) -> Result<Vec<SubscriptionSpec>, RelayError> {
    let mut specs = Vec::new();
    for chain in &config.chains {
        for contract in &config.contracts {
            let entry = registry.get(&contract.name).ok_or_else(|| SchemaError::NotFound {
                name: contract.name.clone(),
            })?;
            let Some(address) = entry.address_on(chain.chain_id) else {
                debug!(chain = %chain.slug, contract = %contract.name, "not deployed on chain, skipping");
                continue;
            };

            let signatures = contract
                .events
                .iter()
                .map(|event| {
                    entry
                        .schema
                        .event_by_name(event)
                        .map(|def| def.selector)
                        .ok_or_else(|| RelayError::UnknownEvent {
                            contract: contract.name.clone(),
                            event: event.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            specs.push(SubscriptionSpec {
                chain: ChainId::new(chain.slug.clone(), chain.chain_id),
                contract: contract.name.clone(),
                filter: LogFilter::for_contract(address).with_signatures(signatures),
                events: contract.events.clone(),
                caller: contract.caller.clone(),
            });
        }
    }
    if specs.is_empty() {
        return Err(RelayError::NothingToWatch);
    }
    Ok(specs)
}

pub struct Relay {
    config: RelayConfig,
    context: RelayContext,
    subscriptions: Vec<SubscriptionSpec>,
}

impl Relay {
    /// Build a relay with the production WebSocket connector and HTTP forwarder.
    pub fn from_config(config: RelayConfig) -> Result<Self, RelayError> {
        let registry = load_registry(&config)?;
        let forwarder = HttpForwarder::new(&config.sink)?;

        let mut connector = WsConnector::new(config.pipeline.connect_timeout(), WsConfig::default());
        for chain in &config.chains {
            connector = connector.with_endpoint(chain.chain_id, chain.resolve_ws_url()?);
        }

        let context = RelayContext {
            metrics: Arc::new(RelayMetrics::new()),
            connector: Arc::new(connector),
            forwarder: Arc::new(forwarder),
            registry: Arc::new(registry),
        };
        Self::new(config, context)
    }

    pub fn new(config: RelayConfig, context: RelayContext) -> Result<Self, RelayError> {
        let subscriptions = plan(&config, &context.registry)?;
        Ok(Self {
            config,
            context,
            subscriptions,
        })
    }

    pub fn subscriptions(&self) -> &[SubscriptionSpec] {
        &self.subscriptions
    }

    pub fn metrics(&self) -> &Arc<RelayMetrics> {
        &self.context.metrics
    }

    /// Run until `cancel` fires (`Ok`) or any orchestrator aborts (`Err`).
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), RelayError> {
        let relay_cancel = cancel.child_token();
        let max_in_flight = self.config.pipeline.max_in_flight;
        let in_flight = Arc::new(Semaphore::new(max_in_flight));

        let mut orchestrators = JoinSet::new();
        for spec in &self.subscriptions {
            let orchestrator = self.orchestrator(spec, Arc::clone(&in_flight))?;
            let token = relay_cancel.clone();
            let chain = spec.chain.to_string();
            let contract = spec.contract.clone();
            orchestrators.spawn(async move {
                let result = orchestrator.run(token).await;
                (chain, contract, result)
            });
        }
        info!(subscriptions = self.subscriptions.len(), max_in_flight, "relay started");

        let mut background = JoinSet::new();
        for monitor in self.monitors() {
            let token = relay_cancel.clone();
            background.spawn(async move { monitor.run(token).await });
        }
        let interval = self.config.pipeline.metrics_interval_secs;
        if interval > 0 {
            let metrics = Arc::clone(&self.context.metrics);
            let token = relay_cancel.clone();
            background.spawn(report_metrics(metrics, Duration::from_secs(interval), token));
        }

        let mut failure = None;
        while let Some(joined) = orchestrators.join_next().await {
            let err = match joined {
                Ok((_, _, Ok(()))) => continue,
                Ok((chain, contract, Err(source))) => {
                    error!(chain = %chain, contract = %contract, "orchestrator aborted, shutting down relay: {source}");
                    RelayError::Stream {
                        chain,
                        contract,
                        source,
                    }
                }
                Err(e) => {
                    error!("orchestrator task failed: {e}");
                    RelayError::Task(e.to_string())
                }
            };
            relay_cancel.cancel();
            if failure.is_none() {
                failure = Some(err);
            }
        }

        relay_cancel.cancel();
        while background.join_next().await.is_some() {}

        // every log task holds one permit until it finishes
        let permits = u32::try_from(max_in_flight).unwrap_or(u32::MAX);
        if let Ok(all) = in_flight.acquire_many(permits).await {
            drop(all);
        }

        let snapshot = self.context.metrics.snapshot();
        info!(
            logs_received = snapshot.logs_received,
            records_forwarded = snapshot.records_forwarded,
            forward_errors = snapshot.forward_errors,
            reconnects = snapshot.reconnects,
            "relay stopped"
        );

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn orchestrator(
        &self,
        spec: &SubscriptionSpec,
        in_flight: Arc<Semaphore>,
    ) -> Result<RetryOrchestrator, RelayError> {
        let schema = self.context.registry.schema(&spec.contract)?;
        let processor = LogProcessor::new(
            spec.chain.clone(),
            spec.contract.clone(),
            schema,
            EventNormalizer::new(spec.caller.clone()),
            Arc::clone(&self.context.forwarder),
            Arc::clone(&self.context.metrics),
        )
        .with_enrichment(self.config.pipeline.enrich_transactions);

        Ok(RetryOrchestrator::new(
            spec.chain.clone(),
            spec.filter.clone(),
            Arc::clone(&self.context.connector),
            Arc::new(processor),
            RetryPolicy::new(self.config.retry.clone()),
            in_flight,
        )
        .with_subscribe_timeout(self.config.pipeline.subscribe_timeout()))
    }

    /// One monitor per subscription whose contract exposes any of the
    /// configured view functions.
    fn monitors(&self) -> Vec<ContractMonitor> {
        let monitor = &self.config.monitor;
        if !monitor.enabled {
            return vec![];
        }
        self.subscriptions
            .iter()
            .filter_map(|spec| {
                let entry = self.context.registry.get(&spec.contract)?;
                let functions: Vec<_> = monitor
                    .functions
                    .iter()
                    .filter_map(|name| {
                        let view = entry.view(name).cloned();
                        if view.is_none() {
                            debug!(contract = %spec.contract, function = %name, "no such view function, skipping");
                        }
                        view
                    })
                    .collect();
                if functions.is_empty() {
                    return None;
                }
                Some(
                    ContractMonitor::new(
                        spec.chain.clone(),
                        spec.contract.clone(),
                        spec.address(),
                        functions,
                        Arc::clone(&self.context.connector),
                    )
                    .with_interval(Duration::from_secs(monitor.interval_secs))
                    .with_retry_delay(Duration::from_secs(monitor.retry_delay_secs)),
                )
            })
            .collect()
    }
}

async fn report_metrics(metrics: Arc<RelayMetrics>, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let s = metrics.snapshot();
                info!(
                    logs_received = s.logs_received,
                    events_decoded = s.events_decoded,
                    unknown_events = s.unknown_events,
                    decode_errors = s.decode_errors,
                    records_forwarded = s.records_forwarded,
                    forward_skipped = s.forward_skipped,
                    forward_errors = s.forward_errors,
                    reconnects = s.reconnects,
                    mean_latency_ms = s.mean_latency_ms,
                    "relay metrics"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChainConfig, ContractConfig};
    use crate::testing::{
        eventually, mint_log, Attempt, FakeTransport, RecordingForwarder, ScriptedConnector, TOKEN_ABI,
        TOKEN_ADDRESS,
    };
    use chainrelay_evm::abi::schema_from_json;
    use std::collections::BTreeMap;

    fn config(max_attempts: u32) -> RelayConfig {
        let mut config = RelayConfig::from_yaml(
            r#"
chains:
  - { slug: polygon-amoy, chain_id: 80002, ws_url: "ws://node.test" }
  - { slug: sepolia, chain_id: 11155111, ws_url: "ws://sepolia.test" }
contracts:
  - { name: Token, abi: token.abi.json, addresses: token.addresses.json, events: [Mint] }
pipeline: { metrics_interval_secs: 0 }
"#,
        )
        .unwrap();
        config.retry.max_attempts = max_attempts;
        config
    }

    fn registry() -> ContractRegistry {
        let mut registry = ContractRegistry::new();
        registry.insert(
            schema_from_json("Token", TOKEN_ABI).unwrap(),
            BTreeMap::from([(80_002, TOKEN_ADDRESS)]),
            vec![],
        );
        registry
    }

    fn context(connector: Arc<ScriptedConnector>, forwarder: Arc<RecordingForwarder>) -> RelayContext {
        RelayContext {
            metrics: Arc::new(RelayMetrics::new()),
            connector,
            forwarder,
            registry: Arc::new(registry()),
        }
    }

    #[test]
    fn plan_skips_chains_without_deployment() {
        let specs = plan(&config(5), &registry()).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].chain.chain_id, 80_002);
        assert_eq!(specs[0].address(), TOKEN_ADDRESS);
        assert_eq!(specs[0].filter.signatures.len(), 1);
        assert!(specs[0].to_string().contains("[Mint]"));
    }

    #[test]
    fn plan_rejects_unknown_event_filter() {
        let mut cfg = config(5);
        cfg.contracts[0].events = vec!["Minted".into()];
        assert!(matches!(
            plan(&cfg, &registry()),
            Err(RelayError::UnknownEvent { .. })
        ));
    }

    #[test]
    fn plan_with_nothing_deployed_fails() {
        let mut cfg = config(5);
        cfg.chains = vec![ChainConfig {
            slug: "base".into(),
            chain_id: 8_453,
            ws_url: Some("ws://base.test".into()),
            ws_url_env: None,
        }];
        assert!(matches!(plan(&cfg, &registry()), Err(RelayError::NothingToWatch)));
    }

    #[test]
    fn plan_requires_loaded_contract() {
        let mut cfg = config(5);
        cfg.contracts.push(ContractConfig {
            name: "Bridge".into(),
            abi: "bridge.abi.json".into(),
            addresses: "bridge.addresses.json".into(),
            events: vec![],
            caller: CallerConfig::default(),
        });
        assert!(matches!(plan(&cfg, &registry()), Err(RelayError::Schema(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn relays_until_cancelled() {
        let (transport, feed) = FakeTransport::new("node-a");
        let connector = ScriptedConnector::new(vec![Attempt::Accept(transport.clone())]);
        let forwarder = Arc::new(RecordingForwarder::default());
        let relay = Arc::new(Relay::new(config(5), context(connector, forwarder.clone())).unwrap());

        let cancel = CancellationToken::new();
        let task = {
            let relay = relay.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { relay.run(cancel).await })
        };

        feed.logs.send(mint_log(0)).unwrap();
        feed.logs.send(mint_log(1)).unwrap();
        eventually(|| forwarder.records().len() == 2).await;

        cancel.cancel();
        task.await.unwrap().unwrap();
        assert_eq!(transport.unsubscribed().len(), 1);
        assert_eq!(relay.metrics().snapshot().records_forwarded, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_of_one_pair_stops_the_relay() {
        let connector = ScriptedConnector::new(vec![]);
        let forwarder = Arc::new(RecordingForwarder::default());
        let relay = Relay::new(config(2), context(connector.clone(), forwarder)).unwrap();

        let err = relay.run(CancellationToken::new()).await.unwrap_err();
        match err {
            RelayError::Stream { chain, contract, source } => {
                assert_eq!(chain, "polygon-amoy(80002)");
                assert_eq!(contract, "Token");
                assert!(matches!(source, StreamError::Aborted { attempts: 2, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(connector.connects(), 2);
    }
}
