//! Authorization endpoint and upstream callback.
//!
//! `/authorize` validates the client request and parks it under a fresh opaque
//! state before sending the browser to the upstream provider. The callback
//! reclaims that flow exactly once, exchanges the provider code, and sends the
//! browser back to the client with a local authorization code.

use std::sync::Arc;

use axum::{
    extract::{Query, State, rejection::QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::pages;
use super::pkce::METHOD_S256;
use super::store::OAuthStore;
use super::types::AuthorizationFlow;
use crate::error::{OAuthError, OAuthResult, UpstreamError};
use crate::server::transport::HttpState;

/// Provider error codes forwarded to the client unchanged. Anything else
/// concerns the proxy's own upstream registration and becomes `server_error`.
const FORWARDED_PROVIDER_ERRORS: &[&str] = &["access_denied", "temporarily_unavailable"];

// ─── Authorization Endpoint ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub response_type: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// `GET /authorize`
///
/// On success, 302 to the upstream provider. On failure, a 400 page and no
/// redirect: the redirect target is not trusted until it has been matched.
pub async fn handle_authorize(
    State(state): State<Arc<HttpState>>,
    query: Result<Query<AuthorizeQuery>, QueryRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            return pages::error_response(&OAuthError::invalid_request(rejection.body_text()));
        }
    };

    let flow = match validate_authorize(&state.oauth, query).await {
        Ok(flow) => flow,
        Err(err) => {
            tracing::warn!(error = %err, "Rejected authorization request");
            return pages::error_response(&err);
        }
    };

    let client_id = flow.client_id.clone();
    let upstream_state = state.oauth.begin_authorization(flow).await;
    let location = state.upstream.authorization_url(&upstream_state);

    tracing::info!(client_id = %client_id, "Redirecting to upstream provider");

    found(&location)
}

async fn validate_authorize(
    store: &OAuthStore,
    query: AuthorizeQuery,
) -> OAuthResult<AuthorizationFlow> {
    let Some(client_id) = query.client_id.filter(|s| !s.is_empty()) else {
        return Err(OAuthError::invalid_request("missing client_id"));
    };
    let Some(client) = store.get_client(&client_id).await else {
        return Err(OAuthError::invalid_request("unknown client_id"));
    };

    let Some(redirect_uri) = query.redirect_uri else {
        return Err(OAuthError::invalid_request("missing redirect_uri"));
    };
    if !client.allows_redirect(&redirect_uri) {
        return Err(OAuthError::invalid_request("redirect_uri not registered for this client"));
    }

    if query.response_type.as_deref().is_some_and(|t| t != "code") {
        return Err(OAuthError::invalid_request("response_type must be 'code'"));
    }

    if query.code_challenge_method.as_deref() != Some(METHOD_S256) {
        return Err(OAuthError::invalid_request("code_challenge_method must be 'S256'"));
    }
    let Some(code_challenge) = query.code_challenge.filter(|c| !c.is_empty()) else {
        return Err(OAuthError::invalid_request("missing code_challenge"));
    };

    Ok(AuthorizationFlow {
        client_id,
        redirect_uri,
        client_state: query.state,
        code_challenge,
    })
}

// ─── Upstream Callback ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// `GET {callback_path}`
///
/// The pending record is removed before the exchange, so a replayed or
/// concurrent callback for the same state finds nothing.
pub async fn handle_callback(
    State(state): State<Arc<HttpState>>,
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            return pages::error_response(&OAuthError::invalid_request(rejection.body_text()));
        }
    };

    let Some(upstream_state) = query.state.as_deref().filter(|s| !s.is_empty()) else {
        return pages::error_response(&OAuthError::invalid_request("missing state"));
    };

    let Some(flow) = state.oauth.take_pending(upstream_state).await else {
        tracing::warn!("Callback with unknown or expired state");
        return pages::error_response(&OAuthError::invalid_request("unknown or expired state"));
    };

    if let Some(error) = query.error {
        tracing::info!(client_id = %flow.client_id, provider_error = %error, "Upstream provider denied authorization");
        let forwarded = if FORWARDED_PROVIDER_ERRORS.contains(&error.as_str()) {
            error.as_str()
        } else {
            "server_error"
        };
        return redirect_to_client(&flow, "error", forwarded);
    }

    let Some(provider_code) = query.code.filter(|c| !c.is_empty()) else {
        return pages::error_response(&OAuthError::invalid_request("missing code"));
    };

    // Outside the store lock; dropping this future (client gone) aborts the exchange.
    let exchange = tokio::time::timeout(
        state.upstream_timeout,
        state.upstream.exchange_code(&provider_code),
    )
    .await
    .unwrap_or(Err(UpstreamError::Timeout(state.upstream_timeout)));

    let upstream_token = match exchange {
        Ok(token) => token,
        Err(err) => {
            tracing::error!(client_id = %flow.client_id, error = %err, "Upstream code exchange failed");
            return pages::error_response(&OAuthError::from(err));
        }
    };

    let code = state.oauth.complete_authorization(&flow, upstream_token).await;

    tracing::info!(client_id = %flow.client_id, "Upstream authorization complete, issued code");

    redirect_to_client(&flow, "code", &code)
}

/// 302 to the client's registered redirect URI with one parameter plus its `state`.
fn redirect_to_client(flow: &AuthorizationFlow, key: &str, value: &str) -> Response {
    let mut url = match url::Url::parse(&flow.redirect_uri) {
        Ok(url) => url,
        Err(err) => {
            tracing::error!(client_id = %flow.client_id, error = %err, "Registered redirect_uri no longer parses");
            return pages::error_response(&OAuthError::invalid_request("invalid redirect_uri"));
        }
    };

    {
        let mut query = url.query_pairs_mut();
        query.append_pair(key, value);
        if let Some(client_state) = &flow.client_state {
            query.append_pair("state", client_state);
        }
    }

    found(url.as_str())
}

fn found(location: &str) -> Response {
    let Ok(location) = HeaderValue::from_str(location) else {
        return pages::error_response(&OAuthError::invalid_request("invalid redirect target"));
    };

    let mut response = StatusCode::FOUND.into_response();
    let headers = response.headers_mut();
    headers.insert(header::LOCATION, location);
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
