//! `WsConnector`: hands out a fresh [`WsTransport`] per attempt.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chainrelay_core::chain::ChainId;
use chainrelay_core::error::StreamError;
use chainrelay_core::transport::{Connector, LogTransport};

use crate::client::{redact_url, WsConfig, WsTransport};

/// Resolves a chain to its WebSocket endpoint and opens a new session.
#[derive(Debug, Clone)]
pub struct WsConnector {
    /// chain id → ws(s) URL
    endpoints: HashMap<u64, String>,
    connect_timeout: Duration,
    config: WsConfig,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration, config: WsConfig) -> Self {
        Self {
            endpoints: HashMap::new(),
            connect_timeout,
            config,
        }
    }

    pub fn with_endpoint(mut self, chain_id: u64, url: impl Into<String>) -> Self {
        self.endpoints.insert(chain_id, url.into());
        self
    }

    pub fn endpoint(&self, chain_id: u64) -> Option<&str> {
        self.endpoints.get(&chain_id).map(String::as_str)
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, chain: &ChainId) -> Result<Arc<dyn LogTransport>, StreamError> {
        let url = self
            .endpoint(chain.chain_id)
            .ok_or_else(|| StreamError::ConnectionFailed {
                url: "<unconfigured>".into(),
                reason: format!("no WebSocket endpoint configured for {chain}"),
            })?;

        let connect = WsTransport::connect(url, self.config.clone());
        match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(transport)) => Ok(Arc::new(transport)),
            Ok(Err(e)) => Err(StreamError::ConnectionFailed {
                url: redact_url(url),
                reason: e.to_string(),
            }),
            Err(_) => Err(StreamError::ConnectionFailed {
                url: redact_url(url),
                reason: format!("timed out after {}ms", self.connect_timeout.as_millis()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_chain_fails_without_dialing() {
        let connector = WsConnector::new(Duration::from_secs(1), WsConfig::default())
            .with_endpoint(80002, "wss://polygon-amoy.example/ws");
        let err = connector
            .connect(&ChainId::new("sepolia", 11_155_111))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StreamError::ConnectionFailed { .. }));
        assert!(err.to_string().contains("sepolia"));
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let connector = WsConnector::new(Duration::from_secs(5), WsConfig::default())
            .with_endpoint(1, "ws://127.0.0.1:1");
        let err = connector
            .connect(&ChainId::new("ethereum", 1))
            .await
            .err()
            .unwrap();
        match err {
            StreamError::ConnectionFailed { url, .. } => assert_eq!(url, "ws://127.0.0.1"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
