//! `HttpForwarder`: one best-effort `POST` per record.

use async_trait::async_trait;
use chainrelay_core::{error::ForwardError, record::NormalizedRecord};
use indexmap::IndexMap;
use url::Url;

use crate::config::SinkConfig;

/// Outcome of a forward attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// The sink answered 2xx
    Delivered { status: u16 },
    /// No endpoint is configured for the event; nothing was sent
    Skipped,
}

/// Delivers normalized records downstream.
///
/// Implementations make a single attempt. Failures are reported, never
/// retried: the sink is idempotent on `id` and redelivery after a reconnect
/// is the only second chance a record gets.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, record: &NormalizedRecord) -> Result<Ack, ForwardError>;
}

/// Resolve the endpoint table against `base_url`.
pub fn resolve_endpoints(config: &SinkConfig) -> Result<IndexMap<String, Url>, ForwardError> {
    let base = match &config.base_url {
        Some(b) => Some(Url::parse(b).map_err(|e| ForwardError::InvalidEndpoint {
            endpoint: b.clone(),
            reason: format!("base_url: {e}"),
        })?),
        None => None,
    };

    let mut out = IndexMap::with_capacity(config.endpoints.len());
    for (event, endpoint) in &config.endpoints {
        let url = match Url::parse(endpoint) {
            Ok(abs) => abs,
            Err(url::ParseError::RelativeUrlWithoutBase) => match &base {
                Some(base) => base.join(endpoint).map_err(|e| ForwardError::InvalidEndpoint {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                })?,
                None => {
                    return Err(ForwardError::InvalidEndpoint {
                        endpoint: endpoint.clone(),
                        reason: format!("relative endpoint for {event} but no base_url"),
                    })
                }
            },
            Err(e) => {
                return Err(ForwardError::InvalidEndpoint {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                })
            }
        };
        out.insert(event.clone(), url);
    }
    Ok(out)
}

/// HTTP JSON forwarder.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
    endpoints: IndexMap<String, Url>,
}

impl HttpForwarder {
    pub fn new(config: &SinkConfig) -> Result<Self, ForwardError> {
        let endpoints = resolve_endpoints(config)?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ForwardError::Transport {
                url: config.base_url.clone().unwrap_or_default(),
                reason: format!("building HTTP client: {e}"),
            })?;
        Ok(Self { client, endpoints })
    }

    /// Endpoint for `event_name`, if configured.
    pub fn endpoint(&self, event_name: &str) -> Option<&Url> {
        self.endpoints.get(event_name)
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, record: &NormalizedRecord) -> Result<Ack, ForwardError> {
        let Some(url) = self.endpoints.get(&record.event_name) else {
            tracing::debug!(event = %record.event_name, id = %record.id, "no sink endpoint, skipping");
            return Ok(Ack::Skipped);
        };

        let resp = self
            .client
            .post(url.clone())
            .json(record)
            .send()
            .await
            .map_err(|e| ForwardError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ForwardError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(
            event = %record.event_name,
            id = %record.id,
            status = status.as_u16(),
            "record forwarded"
        );
        Ok(Ack::Delivered {
            status: status.as_u16(),
        })
    }
}
