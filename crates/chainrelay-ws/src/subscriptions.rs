//! Log subscription bookkeeping.
//!
//! Maps node-assigned subscription ids to the log and error channels handed
//! out to callers, and converts `eth_subscription` payloads into [`RawLog`]s.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy_primitives::{Address, Bytes, B256, U64};
use chainrelay_core::error::TransportError;
use chainrelay_core::event::RawLog;
use chainrelay_core::transport::SubscriptionId;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

/// Notifications that arrive before their subscription is registered are
/// held up to this many per id.
const EARLY_BUFFER_LIMIT: usize = 1024;

/// Log object as it appears in an `eth_subscription` notification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireLog {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<B256>,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub block_number: Option<U64>,
    /// Required: together with `log_index` it identifies the record
    pub transaction_hash: B256,
    pub log_index: U64,
    /// Set when the log was reorged out
    #[serde(default)]
    pub removed: bool,
}

impl WireLog {
    /// `None` for removed logs.
    pub fn into_raw(self) -> Option<RawLog> {
        if self.removed {
            return None;
        }
        Some(RawLog {
            address: self.address,
            topics: self.topics,
            data: self.data,
            block_number: self.block_number.unwrap_or_default().to::<u64>(),
            transaction_hash: self.transaction_hash,
            log_index: self.log_index.to::<u64>(),
        })
    }
}

struct SubscriptionEntry {
    logs: mpsc::UnboundedSender<RawLog>,
    errors: mpsc::UnboundedSender<TransportError>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<SubscriptionId, SubscriptionEntry>,
    early: HashMap<SubscriptionId, Vec<Value>>,
    /// Set once the connection is gone
    closed: Option<String>,
}

/// Routes notifications to the channels of active subscriptions.
#[derive(Clone, Default)]
pub struct SubscriptionManager {
    inner: Arc<Mutex<Inner>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new subscription and return its (logs, errors) receivers.
    /// Notifications that raced ahead of the `eth_subscribe` reply are
    /// delivered first.
    pub fn register(
        &self,
        id: SubscriptionId,
    ) -> (
        mpsc::UnboundedReceiver<RawLog>,
        mpsc::UnboundedReceiver<TransportError>,
    ) {
        let (log_tx, log_rx) = mpsc::unbounded_channel();
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        if let Some(reason) = &inner.closed {
            let _ = err_tx.send(TransportError::WebSocket(reason.clone()));
            return (log_rx, err_rx);
        }
        if let Some(early) = inner.early.remove(&id) {
            for payload in early {
                forward_log(&id, &log_tx, payload);
            }
        }
        inner.entries.insert(
            id,
            SubscriptionEntry {
                logs: log_tx,
                errors: err_tx,
            },
        );
        (log_rx, err_rx)
    }

    /// Forward an incoming notification to the correct subscription.
    pub fn dispatch(&self, id: &SubscriptionId, payload: Value) {
        let mut inner = self.lock();
        match inner.entries.get(id) {
            Some(entry) => forward_log(id, &entry.logs, payload),
            None => {
                let buf = inner.early.entry(id.clone()).or_default();
                if buf.len() < EARLY_BUFFER_LIMIT {
                    buf.push(payload);
                }
            }
        }
    }

    /// Remove a subscription (e.g. after `eth_unsubscribe`).
    pub fn remove(&self, id: &SubscriptionId) {
        let mut inner = self.lock();
        inner.entries.remove(id);
        inner.early.remove(id);
    }

    /// Fail every subscription: the connection is gone. Drops all entries, so
    /// both channels close after the error is delivered. Later registrations
    /// fail immediately.
    pub fn fail_all(&self, reason: &str) {
        let mut inner = self.lock();
        inner.closed = Some(reason.to_string());
        for (id, entry) in inner.entries.drain() {
            tracing::debug!(subscription = %id, reason, "failing subscription");
            let _ = entry.errors.send(TransportError::WebSocket(reason.to_string()));
        }
        inner.early.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn forward_log(id: &SubscriptionId, tx: &mpsc::UnboundedSender<RawLog>, payload: Value) {
    match serde_json::from_value::<WireLog>(payload) {
        Ok(wire) => match wire.into_raw() {
            Some(raw) => {
                let _ = tx.send(raw);
            }
            None => tracing::debug!(subscription = %id, "dropping removed log"),
        },
        Err(e) => tracing::warn!(subscription = %id, error = %e, "malformed log notification"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log_json(removed: bool) -> Value {
        json!({
            "address": "0x03a07c5991b70497813f8cb4c886f19e1a231d5c",
            "topics": ["0x0f6798a560793a54c3bcfe86a93cde1e73087d944c0ea20544137d4121396885"],
            "data": "0x00",
            "blockNumber": "0x1a",
            "transactionHash": format!("0x{}", "ab".repeat(32)),
            "logIndex": "0x3",
            "blockHash": format!("0x{}", "cd".repeat(32)),
            "removed": removed
        })
    }

    #[test]
    fn wire_log_to_raw() {
        let wire: WireLog = serde_json::from_value(log_json(false)).unwrap();
        let raw = wire.into_raw().unwrap();
        assert_eq!(raw.block_number, 26);
        assert_eq!(raw.log_index, 3);
        assert_eq!(raw.topics.len(), 1);
        assert_eq!(raw.data.len(), 1);
    }

    #[test]
    fn log_without_position_is_rejected() {
        for field in ["transactionHash", "logIndex"] {
            let mut payload = log_json(false);
            payload.as_object_mut().unwrap().remove(field);
            assert!(serde_json::from_value::<WireLog>(payload).is_err(), "{field}");

            let mut payload = log_json(false);
            payload[field] = Value::Null;
            assert!(serde_json::from_value::<WireLog>(payload).is_err(), "{field}");
        }
    }

    #[test]
    fn logs_without_position_are_not_delivered() {
        let mgr = SubscriptionManager::new();
        let id = SubscriptionId("0x5".into());
        let (mut logs, _errors) = mgr.register(id.clone());

        for data in ["0x01", "0x02"] {
            let mut payload = log_json(false);
            let obj = payload.as_object_mut().unwrap();
            obj.remove("transactionHash");
            obj.remove("logIndex");
            obj.insert("data".into(), json!(data));
            mgr.dispatch(&id, payload);
        }
        mgr.dispatch(&id, log_json(false));

        let delivered = logs.try_recv().unwrap();
        assert_eq!(delivered.log_index, 3);
        assert_eq!(delivered.transaction_hash, B256::repeat_byte(0xab));
        assert!(logs.try_recv().is_err());
    }

    #[test]
    fn register_and_dispatch() {
        let mgr = SubscriptionManager::new();
        let id = SubscriptionId("0xdeadbeef".into());
        let (mut logs, _errors) = mgr.register(id.clone());

        mgr.dispatch(&id, log_json(false));
        mgr.dispatch(&id, log_json(true));

        assert_eq!(logs.try_recv().unwrap().log_index, 3);
        assert!(logs.try_recv().is_err(), "removed log must be dropped");
    }

    #[test]
    fn early_notifications_are_replayed() {
        let mgr = SubscriptionManager::new();
        let id = SubscriptionId("0x1".into());
        mgr.dispatch(&id, log_json(false));

        let (mut logs, _errors) = mgr.register(id);
        assert!(logs.try_recv().is_ok());
    }

    #[test]
    fn fail_all_signals_errors_and_closes() {
        let mgr = SubscriptionManager::new();
        let id = SubscriptionId("0x2".into());
        let (mut logs, mut errors) = mgr.register(id);
        assert_eq!(mgr.len(), 1);

        mgr.fail_all("socket closed");
        assert!(matches!(errors.try_recv(), Ok(TransportError::WebSocket(_))));
        assert!(mgr.is_empty());
        assert!(matches!(
            logs.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn register_after_close_fails_immediately() {
        let mgr = SubscriptionManager::new();
        mgr.fail_all("stream ended");
        let (_logs, mut errors) = mgr.register(SubscriptionId("0x4".into()));
        assert!(errors.try_recv().is_ok());
        assert!(mgr.is_empty());
    }

    #[test]
    fn remove_subscription() {
        let mgr = SubscriptionManager::new();
        let id = SubscriptionId("0x3".into());
        let _rx = mgr.register(id.clone());
        mgr.remove(&id);
        assert_eq!(mgr.len(), 0);
    }
}
