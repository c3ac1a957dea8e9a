//! The `Transport` contract shared by stdio, streamable HTTP, and package
//! transports (spec §4.3–§4.5).

use async_trait::async_trait;
use mcpclient_protocol::JsonRpcMessage;

use crate::error::TransportResult;
use crate::state::TransportState;

/// A single MCP transport: owns its I/O resources exclusively and is driven
/// by exactly one session client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Starts the transport (spawns the child process / prepares the HTTP
    /// client / etc). Idempotent once successfully started.
    async fn start(&self) -> TransportResult<()>;

    /// Sends a single outbound JSON-RPC message (request, notification,
    /// response, or error).
    async fn send(&self, message: JsonRpcMessage) -> TransportResult<()>;

    /// Awaits the next inbound message not otherwise consumed by
    /// `initialize`. Returns `Ok(None)` when the transport is closed and no
    /// more messages will arrive.
    async fn receive(&self) -> TransportResult<Option<JsonRpcMessage>>;

    /// Awaits the next log line (stdio: a stderr line; HTTP/package
    /// transports with no process of their own yield `Ok(None)` forever).
    async fn receive_logs(&self) -> TransportResult<Option<String>>;

    /// Awaits the next connection-state transition.
    async fn receive_connection_state(&self) -> TransportResult<Option<TransportState>>;

    /// Closes the transport. Idempotent.
    async fn close(&self) -> TransportResult<()>;

    /// Installs (or clears) a bearer token for transports that support
    /// out-of-band reauthorization (spec §6 `AuthorizationFlow`: invoked on
    /// HTTP 401, the session client calls this with the fresh token and
    /// retries once). Transports with no notion of a bearer token (stdio,
    /// package) accept this as a no-op.
    fn set_bearer_token(&self, _token: Option<String>) {}
}
