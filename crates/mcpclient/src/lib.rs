//! `mcpclient`: a Model Context Protocol client runtime — three transports
//! (stdio, Streamable HTTP, DXT package), a session client handling version
//! negotiation/capability gating/request correlation, a from-scratch
//! Draft 2020-12 JSON Schema validator, and an OAuth metadata/token client.
//!
//! This crate re-exports the public surface of each workspace member so
//! callers depend on one crate, matching the teacher's `turbomcp` facade
//! over `turbomcp-protocol`/`turbomcp-transport`/`turbomcp-auth`/etc.

pub mod collaborators;
pub mod error;

pub use error::{Error, Result};

pub use mcpclient_protocol as protocol;
pub use mcpclient_protocol::types;
pub use mcpclient_protocol::{
    IdGenerator, JsonRpcError, JsonRpcErrorCode, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, MonotonicIdGenerator, RequestId,
};

pub use mcpclient_transport_traits::{Transport, TransportError, TransportResult, TransportState};

pub use mcpclient_stdio::{StdioTransport, StdioTransportConfig};
pub use mcpclient_http::{spawn_background_tasks, StreamableHttpConfig, StreamableHttpTransport};
pub use mcpclient_package::{
    resolve as resolve_package, Compatibility, Manifest, McpConfig, McpConfigOverride,
    PackageConfig, PackageTransport, UserConfigField,
};

pub use mcpclient_schema::{validate, SchemaError, ValidationResult, ValidatorConfig};

pub use mcpclient_auth::{discover, exchange_code, register_client, AuthError, TokenExchangeRequest};

pub use mcpclient_client::{
    ErrorEvent, SamplingHandler, SessionClient, SessionClientBuilder, SessionError, SessionResult,
};

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
