//! JSON-RPC 2.0 message framing.
//!
//! Encodes and decodes the four message shapes (request, notification,
//! response, error) plus batches, while preserving the exact `RequestId`
//! variant and rejecting anything that isn't `"jsonrpc": "2.0"`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request_id::RequestId;

/// Unit type that serializes to exactly `"2.0"` and rejects anything else on
/// deserialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == "2.0" {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported jsonrpc version: {s}"
            )))
        }
    }
}

/// A JSON-RPC request: expects a response correlated by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: RequestId,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
            id,
        }
    }
}

/// A JSON-RPC notification: no `id`, no response expected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC protocol-level error object, carried either in a response's
/// `error` field or in a request-scoped `rpc-error`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

/// Standard JSON-RPC error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    Application(i32),
}

impl JsonRpcErrorCode {
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::Application(code) => code,
        }
    }
}

impl From<i32> for JsonRpcErrorCode {
    fn from(code: i32) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            other => Self::Application(other),
        }
    }
}

/// Either a successful result or a protocol error — never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponsePayload {
    Success { result: Value },
    Error { error: JsonRpcError },
}

/// A response `id`. `None` represents a decode-failure response whose `id`
/// was `null` on the wire (spec §4.1: "Treat `id = null` as a
/// decoding-failure response").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ResponseId(pub Option<RequestId>);

impl ResponseId {
    pub fn null() -> Self {
        Self(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }
}

impl From<RequestId> for ResponseId {
    fn from(id: RequestId) -> Self {
        Self(Some(id))
    }
}

/// A JSON-RPC response (success or error), matched back to its request by
/// `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: JsonRpcVersion,
    #[serde(flatten)]
    pub payload: JsonRpcResponsePayload,
    pub id: ResponseId,
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: JsonRpcResponsePayload::Success { result },
            id: ResponseId::from(id),
        }
    }

    pub fn error(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: JsonRpcResponsePayload::Error { error },
            id: ResponseId(id),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.payload, JsonRpcResponsePayload::Success { .. })
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.payload {
            JsonRpcResponsePayload::Success { result } => Some(result),
            JsonRpcResponsePayload::Error { .. } => None,
        }
    }

    pub fn rpc_error(&self) -> Option<&JsonRpcError> {
        match &self.payload {
            JsonRpcResponsePayload::Error { error } => Some(error),
            JsonRpcResponsePayload::Success { .. } => None,
        }
    }
}

/// A batch of messages: an array of one or more requests/notifications (when
/// outbound) or responses (when inbound).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonRpcBatch<T> {
    pub items: Vec<T>,
}

impl<T> JsonRpcBatch<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> Default for JsonRpcBatch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<T>> for JsonRpcBatch<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> IntoIterator for JsonRpcBatch<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Any decoded outbound-or-inbound JSON-RPC unit, including batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
    Batch(Vec<JsonRpcMessage>),
}

impl JsonRpcMessage {
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(r) => Some(&r.id),
            Self::Response(r) => r.id.0.as_ref(),
            Self::Notification(_) | Self::Batch(_) => None,
        }
    }
}

/// Decode failure carrying the original bytes for diagnostics.
#[derive(Debug, thiserror::Error)]
#[error("failed to decode JSON-RPC message: {cause}")]
pub struct DecodeError {
    pub bytes: Vec<u8>,
    pub cause: String,
}

/// Decodes a single JSON-RPC message or batch from bytes.
///
/// Rejects anything whose `jsonrpc` field is not exactly `"2.0"` at any
/// nesting level (enforced by `JsonRpcVersion`'s `Deserialize` impl).
pub fn decode(bytes: &[u8]) -> Result<JsonRpcMessage, DecodeError> {
    serde_json::from_slice(bytes).map_err(|e| DecodeError {
        bytes: bytes.to_vec(),
        cause: e.to_string(),
    })
}

/// Encodes a JSON-RPC message to bytes (no trailing newline; transports add
/// their own framing).
pub fn encode(message: &JsonRpcMessage) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(message)
}

/// `true` if the raw bytes parse as a top-level JSON array (a batch).
pub fn is_batch(bytes: &[u8]) -> bool {
    serde_json::from_slice::<Value>(bytes)
        .map(|v| v.is_array())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn rejects_non_2_0_version() {
        let bad = br#"{"jsonrpc":"1.0","method":"ping","id":1}"#;
        assert!(decode(bad).is_err());
    }

    #[test]
    fn response_success_vs_error_is_exclusive() {
        let success = JsonRpcResponse::success(RequestId::Integer(1), serde_json::json!({}));
        assert!(success.is_success());
        assert!(success.rpc_error().is_none());

        let error = JsonRpcResponse::error(
            Some(RequestId::Integer(1)),
            JsonRpcError {
                code: JsonRpcErrorCode::MethodNotFound.code(),
                message: "nope".into(),
                data: None,
            },
        );
        assert!(!error.is_success());
        assert!(error.result().is_none());
    }

    #[test]
    fn null_id_response_decodes_as_decode_failure_marker() {
        let bytes = br#"{"jsonrpc":"2.0","error":{"code":-32700,"message":"Parse error"},"id":null}"#;
        let msg: JsonRpcMessage = serde_json::from_slice(bytes).unwrap();
        match msg {
            JsonRpcMessage::Response(r) => assert!(r.id.is_null()),
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn batch_decodes_each_message_in_order() {
        let bytes = br#"[
            {"jsonrpc":"2.0","method":"a","id":1},
            {"jsonrpc":"2.0","method":"b"}
        ]"#;
        let msg: JsonRpcMessage = serde_json::from_slice(bytes).unwrap();
        match msg {
            JsonRpcMessage::Batch(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[0], JsonRpcMessage::Request(_)));
                assert!(matches!(items[1], JsonRpcMessage::Notification(_)));
            }
            _ => panic!("expected batch"),
        }
    }

    #[test]
    fn numeric_id_is_never_serialized_as_string() {
        let req = JsonRpcRequest::new(RequestId::Integer(7), "ping", None);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"id\":7"));
        assert!(!json.contains("\"id\":\"7\""));
    }

    proptest! {
        #[test]
        fn request_round_trips_through_encode_decode(
            id in any::<i64>(),
            method in "[a-z/]{1,20}",
        ) {
            let req = JsonRpcMessage::Request(JsonRpcRequest::new(RequestId::Integer(id), method.clone(), None));
            let bytes = encode(&req).unwrap();
            let decoded = decode(&bytes).unwrap();
            match decoded {
                JsonRpcMessage::Request(r) => {
                    prop_assert_eq!(r.id, RequestId::Integer(id));
                    prop_assert_eq!(r.method, method);
                }
                _ => prop_assert!(false, "expected request"),
            }
        }
    }
}
