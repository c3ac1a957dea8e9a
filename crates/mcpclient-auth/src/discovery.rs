//! Discovery-with-fallback (spec §4.8 flow 1).
//!
//! Grounded on the teacher's `discovery/fetcher.rs` for the
//! metadata-fetch-then-derive-defaults shape, simplified to drop SSRF
//! filtering and multi-endpoint (OIDC) probing, which are out of spec
//! scope (see DESIGN.md).

use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::error::AuthError;
use crate::types::{AuthorizationServerMetadata, ProtectedResourceMetadata};

const MCP_PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";

/// Performs the two-step discovery described in spec §4.8:
/// 1. Fetch `resource_metadata_url`; on success, use its
///    `authorization_servers[0]` as the authorization server base. On
///    failure, derive a base URL from `resource_metadata_url` itself and
///    synthesize `<base>/authorize`, `<base>/token`, `<base>/register`.
/// 2. Attempt `<auth-server>/.well-known/oauth-authorization-server`; on a
///    4xx response, synthesize a metadata record using the same defaults.
pub async fn discover(
    client: &Client,
    resource_metadata_url: &str,
    protocol_version: &str,
) -> Result<AuthorizationServerMetadata, AuthError> {
    let resource_url =
        Url::parse(resource_metadata_url).map_err(|e| AuthError::InvalidUrl(e.to_string()))?;

    let auth_server_base = fetch_resource_metadata(client, &resource_url, protocol_version)
        .await
        .unwrap_or_else(|| default_auth_server_base(&resource_url));

    fetch_or_synthesize_as_metadata(client, &auth_server_base, protocol_version).await
}

async fn fetch_resource_metadata(client: &Client, resource_url: &Url, protocol_version: &str) -> Option<String> {
    let response = client
        .get(resource_url.clone())
        .header(MCP_PROTOCOL_VERSION_HEADER, protocol_version)
        .send()
        .await
        .ok()?;
    if !response.status().is_success() {
        return None;
    }
    let metadata: ProtectedResourceMetadata = response.json().await.ok()?;
    metadata.authorization_servers.into_iter().next()
}

fn default_auth_server_base(resource_url: &Url) -> String {
    format!(
        "{}://{}",
        resource_url.scheme(),
        resource_url.host_str().unwrap_or_default()
    )
}

fn synthesize_metadata(auth_server_base: &str) -> AuthorizationServerMetadata {
    AuthorizationServerMetadata {
        issuer: auth_server_base.to_string(),
        authorization_endpoint: format!("{auth_server_base}/authorize"),
        token_endpoint: Some(format!("{auth_server_base}/token")),
        registration_endpoint: Some(format!("{auth_server_base}/register")),
        scopes_supported: None,
        code_challenge_methods_supported: None,
        additional_fields: Default::default(),
    }
}

async fn fetch_or_synthesize_as_metadata(
    client: &Client,
    auth_server_base: &str,
    protocol_version: &str,
) -> Result<AuthorizationServerMetadata, AuthError> {
    let well_known = format!(
        "{}/.well-known/oauth-authorization-server",
        auth_server_base.trim_end_matches('/')
    );

    let response = client
        .get(&well_known)
        .header(MCP_PROTOCOL_VERSION_HEADER, protocol_version)
        .send()
        .await;

    match response {
        Ok(resp) if resp.status().is_success() => {
            let value: Value = resp
                .json()
                .await
                .map_err(|e| AuthError::DecodeError(e.to_string()))?;
            serde_json::from_value(value).map_err(|e| AuthError::DecodeError(e.to_string()))
        }
        Ok(resp) if resp.status().is_client_error() => Ok(synthesize_metadata(auth_server_base)),
        Ok(resp) => Err(AuthError::NetworkError(
            resp.error_for_status().unwrap_err(),
        )),
        Err(_) => Ok(synthesize_metadata(auth_server_base)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_strips_path() {
        let url = Url::parse("https://resource.example.com/.well-known/mcp-resource").unwrap();
        assert_eq!(default_auth_server_base(&url), "https://resource.example.com");
    }

    #[test]
    fn synthesized_metadata_has_default_endpoints() {
        let metadata = synthesize_metadata("https://auth.example.com");
        assert_eq!(metadata.authorization_endpoint, "https://auth.example.com/authorize");
        assert_eq!(metadata.token_endpoint.as_deref(), Some("https://auth.example.com/token"));
        assert_eq!(metadata.registration_endpoint.as_deref(), Some("https://auth.example.com/register"));
    }
}
