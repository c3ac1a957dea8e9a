//! Dynamic client registration (RFC 7591), spec §4.8.
//!
//! Grounded on the teacher's `oauth2/dcr.rs` `DcrClient::register` — a
//! direct `reqwest` POST rather than the typestate `oauth2` crate, since
//! DCR has no OAuth-flow state machine to model.

use reqwest::Client;

use crate::error::AuthError;
use crate::types::{RegistrationErrorBody, RegistrationRequest, RegistrationResponse};

pub async fn register_client(
    client: &Client,
    registration_endpoint: Option<&str>,
    request: RegistrationRequest,
) -> Result<RegistrationResponse, AuthError> {
    let endpoint = registration_endpoint.ok_or(AuthError::MissingRegistrationEndpoint)?;

    let response = client.post(endpoint).json(&request).send().await?;

    if response.status() == reqwest::StatusCode::CREATED {
        return response
            .json()
            .await
            .map_err(|e| AuthError::DecodeError(e.to_string()));
    }

    if response.status().is_client_error() {
        let body: RegistrationErrorBody = response
            .json()
            .await
            .map_err(|e| AuthError::DecodeError(e.to_string()))?;
        return Err(AuthError::RegistrationFailed(match body.error_description {
            Some(desc) => format!("{}: {desc}", body.error),
            None => body.error,
        }));
    }

    Err(AuthError::RegistrationFailed(format!(
        "unexpected status {}",
        response.status()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn missing_endpoint_fails_locally() {
        let client = Client::new();
        let err = register_client(&client, None, RegistrationRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingRegistrationEndpoint));
    }

    #[tokio::test]
    async fn successful_registration_returns_client_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/register"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "client_id": "new-client-id"
            })))
            .mount(&server)
            .await;

        let client = Client::new();
        let response = register_client(
            &client,
            Some(&format!("{}/register", server.uri())),
            RegistrationRequest::default(),
        )
        .await
        .unwrap();

        assert_eq!(response.client_id, "new-client-id");
    }

    #[tokio::test]
    async fn invalid_redirect_uri_surfaces_typed_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/register"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_redirect_uri",
                "error_description": "redirect_uris must use https"
            })))
            .mount(&server)
            .await;

        let client = Client::new();
        let err = register_client(
            &client,
            Some(&format!("{}/register", server.uri())),
            RegistrationRequest::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AuthError::RegistrationFailed(msg) if msg.contains("invalid_redirect_uri")));
    }
}
