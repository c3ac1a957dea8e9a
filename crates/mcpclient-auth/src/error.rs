//! The OAuth error taxonomy (spec §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("oauth error response: {error}{}", description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    OAuthErrorResponse {
        error: String,
        description: Option<String>,
    },

    #[error("authorization server metadata has no registration_endpoint")]
    MissingRegistrationEndpoint,

    #[error("dynamic client registration failed: {0}")]
    RegistrationFailed(String),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    DecodeError(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}
