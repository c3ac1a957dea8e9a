//! The `SamplingHandler` collaborator (spec §6): delegates server-initiated
//! `sampling/createMessage` requests to caller-supplied logic. No default
//! implementation is provided — if the session client was built without one,
//! `sampling/createMessage` is answered locally with method-not-found.

use async_trait::async_trait;
use mcpclient_protocol::types::{CreateMessageRequest, CreateMessageResult};

#[async_trait]
pub trait SamplingHandler: Send + Sync {
    /// Produces the message the server asked the client to sample. The
    /// returned `CreateMessageResult` is serialized verbatim as the JSON-RPC
    /// response (spec's simplified `sample(CreateMessageRequest) ->
    /// Result<Content>` signature is widened here to the full result shape,
    /// since that's what the wire format requires — see DESIGN.md).
    async fn sample(&self, request: CreateMessageRequest) -> Result<CreateMessageResult, String>;
}
