//! The facade-level error taxonomy (spec §7): aggregates every crate-local
//! error type so callers that don't care which layer failed can match on
//! one `Error`, matching the teacher's `turbomcp-server::ServerError`
//! pattern of a rich top-level enum wrapping crate-local errors via
//! `#[from]`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] mcpclient_transport_traits::TransportError),

    #[error("session error: {0}")]
    Session(#[from] mcpclient_client::SessionError),

    #[error("schema validation error: {0}")]
    Schema(#[from] mcpclient_schema::SchemaError),

    #[error("authorization error: {0}")]
    Auth(#[from] mcpclient_auth::AuthError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_converts_via_from() {
        let err: Error = mcpclient_transport_traits::TransportError::NotStarted.into();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn schema_error_converts_via_from() {
        let err: Error = mcpclient_schema::SchemaError::ConstEnumMismatch.into();
        assert!(matches!(err, Error::Schema(_)));
    }
}
