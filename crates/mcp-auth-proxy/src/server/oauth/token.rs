//! Token endpoint (RFC 6749 §3.2).
//!
//! Codes and refresh tokens are removed from the store before any check runs.
//! Whatever the outcome, a presented credential is spent.

use std::sync::Arc;

use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::pkce;
use super::store::OAuthStore;
use super::types::{RegisteredClient, TokenPair};
use crate::config::oauth::AUTH_CODE_TTL;
use crate::error::{OAuthError, OAuthResult};
use crate::server::transport::HttpState;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub code: Option<String>,
    pub code_verifier: Option<String>,
    pub redirect_uri: Option<String>,
    pub refresh_token: Option<String>,
}

/// `POST /token`
///
/// Exchange an authorization code for tokens, or rotate a refresh token.
pub async fn handle_token(
    State(state): State<Arc<HttpState>>,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => return OAuthError::invalid_request(rejection.body_text()).into_response(),
    };

    match exchange(&state.oauth, &form).await {
        Ok(pair) => token_success(&pair),
        Err(err) => {
            tracing::warn!(
                client_id = form.client_id.as_deref().unwrap_or(""),
                grant_type = form.grant_type.as_deref().unwrap_or(""),
                error = err.error_code(),
                reason = %err,
                "Token request rejected"
            );
            err.into_response()
        }
    }
}

async fn exchange(store: &OAuthStore, form: &TokenRequest) -> OAuthResult<TokenPair> {
    let Some(client_id) = form.client_id.as_deref().filter(|s| !s.is_empty()) else {
        return Err(OAuthError::invalid_client("missing client_id"));
    };
    let Some(client_secret) = form.client_secret.as_deref() else {
        return Err(OAuthError::invalid_client("missing client_secret"));
    };
    let client = store.authenticate_client(client_id, client_secret).await?;

    match form.grant_type.as_deref() {
        Some("authorization_code") => authorization_code_grant(store, &client, form).await,
        Some("refresh_token") => refresh_token_grant(store, &client, form).await,
        Some(other) => Err(OAuthError::UnsupportedGrantType(other.to_string())),
        None => Err(OAuthError::invalid_request("missing grant_type")),
    }
}

async fn authorization_code_grant(
    store: &OAuthStore,
    client: &RegisteredClient,
    form: &TokenRequest,
) -> OAuthResult<TokenPair> {
    let Some(code) = form.code.as_deref() else {
        return Err(OAuthError::invalid_request("missing code"));
    };

    let Some(auth_code) = store.take_auth_code(code).await else {
        return Err(OAuthError::invalid_grant("invalid or already used authorization code"));
    };

    if auth_code.is_expired(AUTH_CODE_TTL) {
        return Err(OAuthError::invalid_grant("authorization code expired"));
    }

    if auth_code.client_id != client.client_id {
        return Err(OAuthError::invalid_grant("authorization code was issued to another client"));
    }

    if let Some(redirect_uri) = form.redirect_uri.as_deref() {
        if redirect_uri != auth_code.redirect_uri {
            return Err(OAuthError::invalid_grant("redirect_uri mismatch"));
        }
    }

    let Some(code_verifier) = form.code_verifier.as_deref() else {
        return Err(OAuthError::invalid_grant("missing code_verifier"));
    };
    if !pkce::verify_s256(code_verifier, &auth_code.code_challenge) {
        return Err(OAuthError::invalid_grant("PKCE verification failed"));
    }

    let pair = store.issue_token_pair(&client.client_id).await;

    tracing::info!(client_id = %client.client_id, "Issued token pair");

    Ok(pair)
}

async fn refresh_token_grant(
    store: &OAuthStore,
    client: &RegisteredClient,
    form: &TokenRequest,
) -> OAuthResult<TokenPair> {
    let Some(refresh_token) = form.refresh_token.as_deref() else {
        return Err(OAuthError::invalid_request("missing refresh_token"));
    };

    let Some(old) = store.take_refresh_token(refresh_token).await else {
        return Err(OAuthError::invalid_grant("invalid or already used refresh token"));
    };

    if old.client_id != client.client_id {
        return Err(OAuthError::invalid_grant("refresh token was issued to another client"));
    }

    let pair = store.issue_token_pair(&client.client_id).await;

    tracing::info!(client_id = %client.client_id, "Rotated refresh token");

    Ok(pair)
}

/// Build a token response with required OAuth 2.0 cache headers (RFC 6749 §5.1).
fn token_success(pair: &TokenPair) -> Response {
    let mut response = Json(serde_json::json!({
        "access_token": pair.access_token,
        "token_type": "Bearer",
        "expires_in": pair.expires_in,
        "refresh_token": pair.refresh_token
    }))
    .into_response();

    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}
