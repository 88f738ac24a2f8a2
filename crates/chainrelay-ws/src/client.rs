//! WebSocket JSON-RPC session implementing [`LogTransport`].
//!
//! One `WsTransport` is one socket. A background task owns the stream and
//! multiplexes requests over it; when the socket dies every pending request
//! fails and every subscription's error channel yields. There is no
//! transparent reconnect: the orchestrator builds a fresh transport instead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

use chainrelay_core::error::TransportError;
use chainrelay_core::transport::{
    LogFilter, LogSubscription, LogTransport, SubscriptionId, TransactionInfo,
};

use crate::request::{classify, Inbound, JsonRpcRequest, JsonRpcResponse};
use crate::subscriptions::SubscriptionManager;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, TransportError>>>>>;

/// Configuration for one WebSocket session.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Upper bound on a single request/response round-trip.
    pub request_timeout: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Command sent from callers to the background WS task.
enum WsCommand {
    Send {
        req: JsonRpcRequest,
        tx: oneshot::Sender<Result<Value, TransportError>>,
    },
    Close,
}

/// WebSocket JSON-RPC session.
pub struct WsTransport {
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    subscriptions: SubscriptionManager,
    pending: PendingMap,
    next_id: AtomicU64,
    config: WsConfig,
}

impl WsTransport {
    /// Open the socket and start the background task.
    pub async fn connect(url: impl Into<String>, config: WsConfig) -> Result<Self, TransportError> {
        let url = url.into();
        tracing::info!(url = %redact_url(&url), "connecting via WebSocket");

        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<WsCommand>();
        let subscriptions = SubscriptionManager::new();
        let pending = PendingMap::default();
        tokio::spawn(ws_task(
            redact_url(&url),
            ws_stream,
            cmd_rx,
            subscriptions.clone(),
            pending.clone(),
        ));

        Ok(Self {
            cmd_tx,
            subscriptions,
            pending,
            next_id: AtomicU64::new(1),
            config,
        })
    }

    /// Issue one JSON-RPC call and return its `result`.
    pub async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, params);
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Send { req, tx })
            .map_err(|_| TransportError::Closed)?;

        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, rx).await {
            Err(_) => {
                lock(&self.pending).remove(&id);
                Err(TransportError::Timeout {
                    ms: timeout.as_millis() as u64,
                })
            }
            Ok(Err(_)) => Err(TransportError::Closed),
            Ok(Ok(result)) => result,
        }
    }

    /// Number of live subscriptions on this session.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        lock(&self.pending).len()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
    }
}

#[async_trait]
impl LogTransport for WsTransport {
    async fn subscribe_logs(&self, filter: &LogFilter) -> Result<LogSubscription, TransportError> {
        let result = self
            .request(
                "eth_subscribe",
                vec![Value::String("logs".into()), filter.to_params()],
            )
            .await?;
        let id: String = serde_json::from_value(result)?;
        let id = SubscriptionId(id);
        let (logs, errors) = self.subscriptions.register(id.clone());
        tracing::debug!(subscription = %id, "log subscription registered");
        Ok(LogSubscription { id, logs, errors })
    }

    async fn unsubscribe(&self, id: &SubscriptionId) -> Result<bool, TransportError> {
        self.subscriptions.remove(id);
        let result = self
            .request("eth_unsubscribe", vec![Value::String(id.0.clone())])
            .await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    async fn transaction_by_hash(
        &self,
        hash: &B256,
    ) -> Result<Option<TransactionInfo>, TransportError> {
        let result = self
            .request(
                "eth_getTransactionByHash",
                vec![Value::String(format!("0x{}", alloy_primitives::hex::encode(hash)))],
            )
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(result)?))
    }

    async fn call(&self, to: &Address, data: &Bytes) -> Result<Bytes, TransportError> {
        let tx = serde_json::json!({
            "to": format!("0x{}", alloy_primitives::hex::encode(to)),
            "data": format!("0x{}", alloy_primitives::hex::encode(data)),
        });
        let result = self
            .request("eth_call", vec![tx, Value::String("latest".into())])
            .await?;
        Ok(serde_json::from_value(result)?)
    }
}

/// Background task that owns the WebSocket connection.
async fn ws_task<S>(
    url: String,
    ws_stream: S,
    mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>,
    subscriptions: SubscriptionManager,
    pending: PendingMap,
) where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin
        + Send
        + 'static,
{
    let (mut sink, mut stream) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    None | Some(WsCommand::Close) => {
                        let _ = sink.close().await;
                        break "transport closed".to_string();
                    }
                    Some(WsCommand::Send { req, tx }) => {
                        let id = match req.id {
                            crate::request::RpcId::Number(n) => n,
                            _ => 0,
                        };
                        let msg = match serde_json::to_string(&req) {
                            Ok(msg) => msg,
                            Err(e) => {
                                let _ = tx.send(Err(e.into()));
                                continue;
                            }
                        };
                        // caller already timed out
                        if tx.is_closed() {
                            continue;
                        }
                        lock(&pending).insert(id, tx);
                        if let Err(e) = sink.send(Message::Text(msg.into())).await {
                            break format!("send failed: {e}");
                        }
                    }
                }
            }
            msg = stream.next() => {
                match msg {
                    None => break "stream ended".to_string(),
                    Some(Err(e)) => break format!("receive error: {e}"),
                    Some(Ok(Message::Text(text))) => {
                        handle_message(text.as_str(), &pending, &subscriptions);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break format!("closed by peer: {frame:?}");
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    };

    tracing::warn!(url = %url, reason = %reason, "WS session ended");
    for (_, tx) in lock(&pending).drain() {
        let _ = tx.send(Err(TransportError::Closed));
    }
    subscriptions.fail_all(&reason);
}

fn lock(
    pending: &PendingMap,
) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Result<Value, TransportError>>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

fn handle_message(text: &str, pending: &PendingMap, subscriptions: &SubscriptionManager) {
    match classify(text) {
        Inbound::Notification {
            subscription,
            result,
        } => subscriptions.dispatch(&SubscriptionId(subscription), result),
        Inbound::Response { id, body } => {
            let Some(tx) = lock(pending).remove(&id) else {
                tracing::debug!(id, "response for unknown request id");
                return;
            };
            let result = serde_json::from_value::<JsonRpcResponse>(body)
                .map_err(TransportError::from)
                .and_then(JsonRpcResponse::into_result);
            let _ = tx.send(result);
        }
        Inbound::Ignored => tracing::debug!("ignoring unrecognised WS frame"),
    }
}

/// Strip path and query (provider API keys live there) for logging.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(u) => match u.host_str() {
            Some(host) => format!("{}://{}", u.scheme(), host),
            None => u.scheme().to_string(),
        },
        Err(_) => "<invalid url>".to_string(),
    }
}
