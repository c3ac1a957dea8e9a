//! The transport-level error taxonomy (spec §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("transport not started")]
    NotStarted,

    #[error("failed to spawn child process: {0}")]
    SpawnFailed(String),

    #[error("peer closed the connection")]
    PeerClosed,

    #[error("session closed")]
    SessionClosed,

    #[error("request cancelled")]
    Cancelled,

    #[error("http error: status={status} body={body}")]
    HttpError {
        status: u16,
        body: String,
        decoded_rpc_error: Option<mcpclient_protocol::JsonRpcError>,
    },

    #[error("authorization required")]
    AuthRequired,

    #[error("failed to decode message: {cause}")]
    DecodeError { bytes: Vec<u8>, cause: String },

    #[error("unsupported protocol version advertised by server: {0}")]
    UnsupportedProtocol(String),

    #[error("manifest not found")]
    ManifestMissing,

    #[error("manifest invalid: {0}")]
    ManifestInvalid(String),

    #[error("unsupported platform; supported: {0:?}")]
    UnsupportedPlatform(Vec<String>),

    #[error("runtime not installed: {0}")]
    RuntimeNotInstalled(String),

    #[error("runtime version mismatch for {runtime}: required {required}, installed {installed}")]
    RuntimeVersionMismatch {
        runtime: String,
        required: String,
        installed: String,
    },

    #[error("missing required config key: {0}")]
    MissingRequiredConfig(String),

    #[error("sensitive value not allowed for key: {0}")]
    SensitiveValueNotAllowed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;
