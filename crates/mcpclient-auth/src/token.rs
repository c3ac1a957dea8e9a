//! PKCE authorization-code token exchange (spec §4.8 flow 2).

use reqwest::Client;

use crate::error::AuthError;
use crate::types::{OAuthErrorBody, TokenResponse};

/// The parameters of a PKCE authorization-code exchange. `code_verifier` is
/// produced by the caller's `AuthorizationFlow` collaborator (spec §6) —
/// this client only performs the wire exchange.
pub struct TokenExchangeRequest<'a> {
    pub code: &'a str,
    pub code_verifier: &'a str,
    pub redirect_uri: &'a str,
    pub client_id: &'a str,
    pub resource: Option<&'a str>,
}

pub async fn exchange_code(
    client: &Client,
    token_endpoint: &str,
    request: TokenExchangeRequest<'_>,
) -> Result<TokenResponse, AuthError> {
    let mut form = vec![
        ("grant_type", "authorization_code"),
        ("code", request.code),
        ("code_verifier", request.code_verifier),
        ("redirect_uri", request.redirect_uri),
        ("client_id", request.client_id),
    ];
    if let Some(resource) = request.resource {
        form.push(("resource", resource));
    }

    let response = client.post(token_endpoint).form(&form).send().await?;

    if response.status().is_client_error() {
        let body: OAuthErrorBody = response
            .json()
            .await
            .map_err(|e| AuthError::DecodeError(e.to_string()))?;
        return Err(AuthError::OAuthErrorResponse {
            error: body.error,
            description: body.error_description,
        });
    }
    if !response.status().is_success() {
        return Err(AuthError::NetworkError(
            response.error_for_status().unwrap_err(),
        ));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| AuthError::DecodeError(format!("missing or malformed access_token: {e}")))?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn successful_exchange_returns_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-123",
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let client = Client::new();
        let result = exchange_code(
            &client,
            &format!("{}/token", server.uri()),
            TokenExchangeRequest {
                code: "abc",
                code_verifier: "verifier",
                redirect_uri: "http://localhost/callback",
                client_id: "client-1",
                resource: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(result.access_token, "tok-123");
    }

    #[tokio::test]
    async fn error_response_maps_to_oauth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "code expired"
            })))
            .mount(&server)
            .await;

        let client = Client::new();
        let err = exchange_code(
            &client,
            &format!("{}/token", server.uri()),
            TokenExchangeRequest {
                code: "abc",
                code_verifier: "verifier",
                redirect_uri: "http://localhost/callback",
                client_id: "client-1",
                resource: None,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AuthError::OAuthErrorResponse { error, .. } if error == "invalid_grant"));
    }
}
