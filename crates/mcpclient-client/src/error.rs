//! The session-level error taxonomy (spec §4.6, §7).

use mcpclient_protocol::JsonRpcError;
use mcpclient_transport_traits::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("client not connected")]
    NotConnected,

    #[error("capability not advertised by server: {0}")]
    CapabilityUnsupported(&'static str),

    #[error("session closed")]
    SessionClosed,

    #[error("request cancelled")]
    Cancelled,

    #[error("unsupported protocol version advertised by server: {0}")]
    UnsupportedProtocol(String),

    #[error("server returned an error: {0}")]
    Remote(#[from] JsonRpcError),

    #[error("failed to decode message payload: {0}")]
    Decode(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type SessionResult<T> = Result<T, SessionError>;
