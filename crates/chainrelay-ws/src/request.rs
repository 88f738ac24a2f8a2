//! JSON-RPC 2.0 wire types and inbound message classification.

use chainrelay_core::error::{RpcErrorObject, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC request ID: string, number or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(u64),
    String(String),
    Null,
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
    pub id: RpcId,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id: RpcId::Number(id),
        }
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RpcId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl JsonRpcResponse {
    /// Unwrap the result value or return the node's error.
    /// A missing result is read as JSON `null`.
    pub fn into_result(self) -> Result<Value, TransportError> {
        match self.error {
            Some(err) => Err(TransportError::Rpc(err)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// A frame received from the node, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Reply to one of our requests
    Response { id: u64, body: Value },
    /// `eth_subscription` push
    Notification { subscription: String, result: Value },
    /// Anything else (unparseable, string ids, ...)
    Ignored,
}

/// Classify one text frame.
pub fn classify(text: &str) -> Inbound {
    let Ok(val) = serde_json::from_str::<Value>(text) else {
        return Inbound::Ignored;
    };

    if val.get("method").and_then(Value::as_str) == Some("eth_subscription") {
        let params = &val["params"];
        return match params["subscription"].as_str() {
            Some(sub) => Inbound::Notification {
                subscription: sub.to_string(),
                result: params["result"].clone(),
            },
            None => Inbound::Ignored,
        };
    }

    match val.get("id").and_then(Value::as_u64) {
        Some(id) => Inbound::Response { id, body: val },
        None => Inbound::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let req = JsonRpcRequest::new(7, "eth_subscribe", vec![Value::String("logs".into())]);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"eth_subscribe\""));
        assert!(json.contains("\"id\":7"));
    }

    #[test]
    fn response_into_result() {
        let ok: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":"0xabc"}"#).unwrap();
        assert_eq!(ok.into_result().unwrap(), Value::String("0xabc".into()));

        let err: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"invalid params"}}"#,
        )
        .unwrap();
        assert!(matches!(err.into_result(), Err(TransportError::Rpc(e)) if e.code == -32602));
    }

    #[test]
    fn classify_notification() {
        let text = r#"{"jsonrpc":"2.0","method":"eth_subscription","params":{"subscription":"0x9c","result":{"address":"0x00"}}}"#;
        match classify(text) {
            Inbound::Notification { subscription, result } => {
                assert_eq!(subscription, "0x9c");
                assert_eq!(result["address"], "0x00");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn classify_response_and_garbage() {
        assert!(matches!(
            classify(r#"{"jsonrpc":"2.0","id":3,"result":true}"#),
            Inbound::Response { id: 3, .. }
        ));
        assert_eq!(classify("not json"), Inbound::Ignored);
        assert_eq!(classify(r#"{"jsonrpc":"2.0","id":"abc","result":1}"#), Inbound::Ignored);
    }
}
