//! Wire-level types and codecs shared by every MCP transport: JSON-RPC 2.0
//! framing, SSE parsing, request IDs, and the MCP domain types exchanged
//! during initialize and the typed operations.

pub mod jsonrpc;
pub mod request_id;
pub mod sse;
pub mod types;

pub use jsonrpc::{
    decode, encode, is_batch, DecodeError, JsonRpcBatch, JsonRpcError, JsonRpcErrorCode,
    JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    JsonRpcResponsePayload, JsonRpcVersion, ResponseId,
};
pub use request_id::{IdGenerator, MonotonicIdGenerator, RequestId};
pub use sse::{SseEvent, SseParser};
