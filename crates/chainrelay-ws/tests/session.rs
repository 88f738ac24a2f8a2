//! End-to-end tests against an in-process WebSocket JSON-RPC node.

use std::time::Duration;

use alloy_primitives::{Address, Bytes};
use chainrelay_core::error::TransportError;
use chainrelay_core::transport::{LogFilter, LogTransport};
use chainrelay_ws::{WsConfig, WsTransport};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

const SUB_ID: &str = "0xcd0c3e8af590364c09d0fa6a1210faf5";

fn notification(log_index: u64, removed: bool) -> String {
    json!({
        "jsonrpc": "2.0",
        "method": "eth_subscription",
        "params": {
            "subscription": SUB_ID,
            "result": {
                "address": "0x03a07c5991b70497813f8cb4c886f19e1a231d5c",
                "topics": ["0x0f6798a560793a54c3bcfe86a93cde1e73087d944c0ea20544137d4121396885"],
                "data": "0x",
                "blockNumber": "0x10",
                "transactionHash": format!("0x{}", "ab".repeat(32)),
                "logIndex": format!("0x{log_index:x}"),
                "removed": removed
            }
        }
    })
    .to_string()
}

/// Scripted node: answers subscribe/unsubscribe/call, pushes two logs
/// (one of them reorged out), then either keeps serving or hangs up.
async fn spawn_node(hang_up_after_push: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();

        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let req: Value = serde_json::from_str(text.as_str()).unwrap();
            let id = req["id"].clone();
            // never answered
            if req["method"] == "eth_blockNumber" {
                continue;
            }
            let reply = match req["method"].as_str().unwrap() {
                "eth_subscribe" => {
                    assert_eq!(req["params"][0], "logs");
                    json!({"jsonrpc": "2.0", "id": id, "result": SUB_ID})
                }
                "eth_unsubscribe" => json!({"jsonrpc": "2.0", "id": id, "result": true}),
                "eth_call" => json!({"jsonrpc": "2.0", "id": id, "result": "0x2a"}),
                "eth_getTransactionByHash" => json!({"jsonrpc": "2.0", "id": id, "result": null}),
                other => json!({"jsonrpc": "2.0", "id": id,
                    "error": {"code": -32601, "message": format!("method {other} not found")}}),
            };
            ws.send(Message::Text(reply.to_string().into())).await.unwrap();

            if req["method"] == "eth_subscribe" {
                ws.send(Message::Text(notification(1, false).into())).await.unwrap();
                ws.send(Message::Text(notification(2, true).into())).await.unwrap();
                ws.send(Message::Text(notification(3, false).into())).await.unwrap();
                if hang_up_after_push {
                    let _ = ws.close(None).await;
                    return;
                }
            }
        }
    });

    format!("ws://{addr}")
}

#[tokio::test]
async fn subscribe_receive_and_unsubscribe() {
    let url = spawn_node(false).await;
    let transport = WsTransport::connect(url, WsConfig::default()).await.unwrap();

    let filter = LogFilter::for_contract(Address::repeat_byte(0x03));
    let mut sub = transport.subscribe_logs(&filter).await.unwrap();
    assert_eq!(sub.id.0, SUB_ID);

    let first = tokio::time::timeout(Duration::from_secs(5), sub.logs.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.log_index, 1);
    assert_eq!(first.block_number, 16);

    // log 2 was removed by a reorg and must not surface
    let next = tokio::time::timeout(Duration::from_secs(5), sub.logs.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next.log_index, 3);

    let out = transport.call(&Address::ZERO, &Bytes::new()).await.unwrap();
    assert_eq!(out.as_ref(), &[0x2a]);
    assert!(transport
        .transaction_by_hash(&Default::default())
        .await
        .unwrap()
        .is_none());

    assert!(transport.unsubscribe(&sub.id).await.unwrap());
    assert_eq!(transport.subscription_count(), 0);
}

#[tokio::test]
async fn peer_hang_up_fails_subscription() {
    let url = spawn_node(true).await;
    let transport = WsTransport::connect(url, WsConfig::default()).await.unwrap();
    let mut sub = transport
        .subscribe_logs(&LogFilter::for_contract(Address::ZERO))
        .await
        .unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), sub.errors.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(err, TransportError::WebSocket(_)));

    // requests on a dead session fail fast
    let err = transport.call(&Address::ZERO, &Bytes::new()).await.unwrap_err();
    assert!(matches!(err, TransportError::Closed));
}

#[tokio::test]
async fn rpc_error_is_surfaced() {
    let url = spawn_node(false).await;
    let transport = WsTransport::connect(url, WsConfig::default()).await.unwrap();
    let err = transport.request("eth_chainId", vec![]).await.unwrap_err();
    assert!(matches!(err, TransportError::Rpc(e) if e.code == -32601));
}

#[tokio::test]
async fn timed_out_request_is_forgotten() {
    let url = spawn_node(false).await;
    let config = WsConfig {
        request_timeout: Duration::from_millis(200),
    };
    let transport = WsTransport::connect(url, config).await.unwrap();

    let err = transport.request("eth_blockNumber", vec![]).await.unwrap_err();
    assert!(matches!(err, TransportError::Timeout { ms: 200 }));
    assert_eq!(transport.pending_requests(), 0);

    // the session is still usable afterwards
    let out = transport.call(&Address::ZERO, &Bytes::new()).await.unwrap();
    assert_eq!(out.as_ref(), &[0x2a]);
    assert_eq!(transport.pending_requests(), 0);
}
