//! Discovery and registration endpoints.
//!
//! Implements:
//! - RFC 9728: OAuth Protected Resource Metadata
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::pkce::METHOD_S256;
use crate::error::{OAuthError, OAuthResult};
use crate::server::transport::HttpState;

// ─── RFC 9728: Protected Resource Metadata ───────────────────────────────────

/// `GET /.well-known/oauth-protected-resource`
///
/// Tells clients where to find the authorization server for this resource.
pub async fn handle_protected_resource(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    (
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Json(serde_json::json!({
            "resource": state.base_url,
            "authorization_servers": [state.base_url],
            "bearer_methods_supported": ["header"]
        })),
    )
}

// ─── RFC 8414: Authorization Server Metadata ─────────────────────────────────

/// `GET /.well-known/oauth-authorization-server`
///
/// Describes the OAuth endpoints and capabilities.
pub async fn handle_auth_server_metadata(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    (
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Json(serde_json::json!({
            "issuer": state.base_url,
            "authorization_endpoint": format!("{}/authorize", state.base_url),
            "token_endpoint": format!("{}/token", state.base_url),
            "jwks_uri": format!("{}/jwks", state.base_url),
            "registration_endpoint": format!("{}/register", state.base_url),
            "response_types_supported": ["code"],
            "grant_types_supported": ["authorization_code", "refresh_token"],
            "token_endpoint_auth_methods_supported": ["client_secret_post"],
            "code_challenge_methods_supported": [METHOD_S256]
        })),
    )
}

/// `OPTIONS /.well-known/oauth-authorization-server`
///
/// Browser-based clients probe discovery cross-origin.
pub async fn handle_metadata_preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "*"),
        ],
    )
}

/// `GET /jwks`
///
/// Tokens are opaque, so there are no signing keys to publish.
pub async fn handle_jwks() -> impl IntoResponse {
    Json(serde_json::json!({ "keys": [] }))
}

// ─── RFC 7591: Dynamic Client Registration ───────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub client_name: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
}

/// `POST /register`
///
/// Register a new OAuth client dynamically.
pub async fn handle_register(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    if state.registration_limiter.check().is_err() {
        tracing::warn!("Client registration rate limit exceeded");
        return OAuthError::SlowDown.into_response();
    }

    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            return OAuthError::InvalidClientMetadata(rejection.body_text()).into_response();
        }
    };

    let redirect_uris = match validate_redirect_uris(req.redirect_uris.unwrap_or_default()) {
        Ok(uris) => uris,
        Err(err) => return err.into_response(),
    };

    let client = state.oauth.register_client(req.client_name, redirect_uris).await;

    tracing::info!(client_id = %client.client_id, "Registered OAuth client");

    let mut response = (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "client_id": client.client_id,
            "client_secret": client.client_secret,
            "client_id_issued_at": client.issued_at.timestamp(),
            "client_secret_expires_at": 0,
            "client_name": client.client_name,
            "redirect_uris": client.redirect_uris,
            "grant_types": ["authorization_code", "refresh_token"],
            "response_types": ["code"],
            "token_endpoint_auth_method": "client_secret_post"
        })),
    )
        .into_response();

    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// Redirect URIs must be absolute URLs without a fragment (RFC 6749 §3.1.2).
fn validate_redirect_uris(uris: Vec<String>) -> OAuthResult<Vec<String>> {
    if uris.is_empty() {
        return Err(OAuthError::InvalidClientMetadata("redirect_uris is required".to_string()));
    }

    for uri in &uris {
        let parsed = url::Url::parse(uri).map_err(|_| {
            OAuthError::InvalidClientMetadata(format!("redirect_uri is not an absolute URL: {uri}"))
        })?;
        if parsed.cannot_be_a_base() {
            return Err(OAuthError::InvalidClientMetadata(format!(
                "redirect_uri is not an absolute URL: {uri}"
            )));
        }
        if parsed.fragment().is_some() {
            return Err(OAuthError::InvalidClientMetadata(format!(
                "redirect_uri must not contain a fragment: {uri}"
            )));
        }
    }

    Ok(uris)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_redirect_uris() {
        assert!(validate_redirect_uris(vec![]).is_err());
        assert!(validate_redirect_uris(vec!["/relative/cb".into()]).is_err());
        assert!(validate_redirect_uris(vec!["https://a.example/cb#frag".into()]).is_err());
        assert!(validate_redirect_uris(vec!["mailto:someone@example.com".into()]).is_err());
        assert!(
            validate_redirect_uris(vec!["https://a.example/cb".into(), "not a url".into()]).is_err()
        );

        let ok = validate_redirect_uris(vec![
            "https://client.example/cb".into(),
            "http://127.0.0.1:33418/callback?x=1".into(),
        ])
        .unwrap();
        assert_eq!(ok.len(), 2);
    }
}
