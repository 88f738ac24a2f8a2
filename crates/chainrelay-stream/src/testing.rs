//! In-crate doubles for the upstream node and the sink.

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use chainrelay_core::{
    chain::ChainId,
    error::{ForwardError, StreamError, TransportError},
    event::RawLog,
    record::NormalizedRecord,
    schema::InterfaceSchema,
    transport::{Connector, LogFilter, LogSubscription, LogTransport, SubscriptionId, TransactionInfo},
};
use chainrelay_evm::{abi::schema_from_json, fingerprint::keccak256_signature};
use chainrelay_forward::{Ack, Forwarder};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub const TOKEN_ABI: &str = r#"[
  {"type":"event","name":"Transfer","anonymous":false,"inputs":[
    {"name":"from","type":"address","indexed":true},
    {"name":"to","type":"address","indexed":true},
    {"name":"value","type":"uint256","indexed":false}]},
  {"type":"event","name":"Mint","anonymous":false,"inputs":[
    {"name":"to","type":"address","indexed":true},
    {"name":"amount","type":"uint256","indexed":false}]},
  {"type":"event","name":"Burn","anonymous":false,"inputs":[
    {"name":"from","type":"address","indexed":true},
    {"name":"amount","type":"uint256","indexed":false}]},
  {"type":"function","name":"totalSupply","stateMutability":"view","inputs":[],
   "outputs":[{"name":"","type":"uint256"}]},
  {"type":"function","name":"symbol","stateMutability":"view","inputs":[],
   "outputs":[{"name":"","type":"string"}]}
]"#;

pub const TOKEN_ADDRESS: Address = Address::new([0x03; 20]);
pub const MINTER: Address = Address::new([0xd8; 20]);

pub fn token_schema() -> Arc<InterfaceSchema> {
    Arc::new(schema_from_json("Token", TOKEN_ABI).expect("token ABI"))
}

pub fn mint_log(log_index: u64) -> RawLog {
    let mut to = [0u8; 32];
    to[12..].copy_from_slice(MINTER.as_slice());
    RawLog {
        address: TOKEN_ADDRESS,
        topics: vec![keccak256_signature("Mint(address,uint256)"), B256::from(to)],
        data: Bytes::from(U256::from(1_000u64).to_be_bytes::<32>().to_vec()),
        block_number: 42,
        transaction_hash: B256::repeat_byte(0xab),
        log_index,
    }
}

// ─── Sink ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingForwarder {
    records: Mutex<Vec<NormalizedRecord>>,
    fail: bool,
}

impl RecordingForwarder {
    pub fn failing() -> Self {
        Self {
            records: Mutex::default(),
            fail: true,
        }
    }

    pub fn records(&self) -> Vec<NormalizedRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl Forwarder for RecordingForwarder {
    async fn forward(&self, record: &NormalizedRecord) -> Result<Ack, ForwardError> {
        if self.fail {
            return Err(ForwardError::Status {
                url: "http://sink.test".into(),
                status: 503,
                body: "unavailable".into(),
            });
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(Ack::Delivered { status: 200 })
    }
}

// ─── Upstream ────────────────────────────────────────────────────────────────

/// Test-side handle that pushes into a [`FakeTransport`]'s subscription.
pub struct Feed {
    pub logs: mpsc::UnboundedSender<RawLog>,
    pub errors: mpsc::UnboundedSender<TransportError>,
}

pub struct FakeTransport {
    name: String,
    subscribe_fails: bool,
    receivers: Mutex<Option<(mpsc::UnboundedReceiver<RawLog>, mpsc::UnboundedReceiver<TransportError>)>>,
    unsubscribed: Mutex<Vec<SubscriptionId>>,
    calls: Mutex<VecDeque<Bytes>>,
    transaction: Mutex<Option<TransactionInfo>>,
}

impl FakeTransport {
    pub fn new(name: &str) -> (Arc<Self>, Feed) {
        let (log_tx, log_rx) = mpsc::unbounded_channel();
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            name: name.to_string(),
            subscribe_fails: false,
            receivers: Mutex::new(Some((log_rx, err_rx))),
            unsubscribed: Mutex::default(),
            calls: Mutex::default(),
            transaction: Mutex::default(),
        });
        (transport, Feed { logs: log_tx, errors: err_tx })
    }

    /// A session that accepts the connection but rejects `eth_subscribe`.
    pub fn rejecting(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            subscribe_fails: true,
            receivers: Mutex::new(None),
            unsubscribed: Mutex::default(),
            calls: Mutex::default(),
            transaction: Mutex::default(),
        })
    }

    /// Queue `eth_call` return data, answered in order.
    pub fn with_call_results(self: Arc<Self>, results: impl IntoIterator<Item = Bytes>) -> Arc<Self> {
        self.calls.lock().unwrap().extend(results);
        self
    }

    /// Answer `eth_getTransactionByHash` with `tx`.
    pub fn with_transaction(self: Arc<Self>, tx: TransactionInfo) -> Arc<Self> {
        *self.transaction.lock().unwrap() = Some(tx);
        self
    }

    pub fn unsubscribed(&self) -> Vec<SubscriptionId> {
        self.unsubscribed.lock().unwrap().clone()
    }

    fn subscription_id(&self) -> SubscriptionId {
        SubscriptionId(format!("0x{}", self.name))
    }
}

#[async_trait]
impl LogTransport for FakeTransport {
    async fn subscribe_logs(&self, _filter: &LogFilter) -> Result<LogSubscription, TransportError> {
        if self.subscribe_fails {
            return Err(TransportError::Other("subscription rejected".into()));
        }
        let (logs, errors) = self
            .receivers
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| TransportError::Other("already subscribed".into()))?;
        Ok(LogSubscription {
            id: self.subscription_id(),
            logs,
            errors,
        })
    }

    async fn unsubscribe(&self, id: &SubscriptionId) -> Result<bool, TransportError> {
        self.unsubscribed.lock().unwrap().push(id.clone());
        Ok(true)
    }

    async fn transaction_by_hash(&self, hash: &B256) -> Result<Option<TransactionInfo>, TransportError> {
        Ok(self
            .transaction
            .lock()
            .unwrap()
            .clone()
            .filter(|tx| tx.hash == *hash))
    }

    async fn call(&self, _to: &Address, _data: &Bytes) -> Result<Bytes, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::Rpc(chainrelay_core::error::RpcErrorObject {
                code: 3,
                message: "execution reverted".into(),
                data: None,
            }))
    }
}

/// One scripted answer to `connect`.
pub enum Attempt {
    Refuse,
    Accept(Arc<FakeTransport>),
}

/// Replays scripted connection attempts; refuses once the script runs out.
#[derive(Default)]
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Attempt>>,
    connects: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(script: impl IntoIterator<Item = Attempt>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            connects: AtomicUsize::new(0),
        })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, chain: &ChainId) -> Result<Arc<dyn LogTransport>, StreamError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(Attempt::Accept(t)) => Ok(t),
            Some(Attempt::Refuse) | None => Err(StreamError::ConnectionFailed {
                url: "ws://node.test".into(),
                reason: format!("connection refused ({chain})"),
            }),
        }
    }
}

/// Poll `cond` under (possibly paused) tokio time until it holds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}
