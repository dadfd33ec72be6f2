//! HTTP transport.
//!
//! Hosts the OAuth authorization server routes and the bearer-protected MCP
//! endpoint on a single axum router.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Extension, Json, Router,
    extract::State,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::oauth::{
    OAuthStore, UpstreamProvider, VerifiedToken, authorize, handlers, middleware::require_bearer,
    token,
};
use crate::config::Config;

/// Shared state for HTTP handlers.
pub struct HttpState {
    pub oauth: OAuthStore,
    pub upstream: Arc<dyn UpstreamProvider>,
    /// Public base URL, used as issuer and resource identifier.
    pub base_url: String,
    pub callback_path: String,
    pub resource_metadata_url: String,
    /// Upper bound on one upstream code exchange.
    pub upstream_timeout: Duration,
    pub registration_limiter: DefaultDirectRateLimiter,
}

impl HttpState {
    #[must_use]
    pub fn new(config: &Config, oauth: OAuthStore, upstream: Arc<dyn UpstreamProvider>) -> Self {
        Self {
            oauth,
            upstream,
            base_url: config.base_url.clone(),
            callback_path: config.callback_path.clone(),
            resource_metadata_url: config.resource_metadata_url(),
            upstream_timeout: config.upstream.request_timeout,
            registration_limiter: RateLimiter::direct(Quota::per_minute(
                config.registrations_per_minute,
            )),
        }
    }
}

impl std::fmt::Debug for HttpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpState")
            .field("base_url", &self.base_url)
            .field("callback_path", &self.callback_path)
            .field("upstream_timeout", &self.upstream_timeout)
            .finish()
    }
}

/// Create the HTTP router.
pub fn create_router(
    config: &Config,
    oauth: OAuthStore,
    upstream: Arc<dyn UpstreamProvider>,
) -> Router {
    let state = Arc::new(HttpState::new(config, oauth, upstream));

    let protected = Router::new()
        .route("/mcp", get(handle_mcp).post(handle_mcp))
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state), require_bearer));

    // Discovery documents carry their own CORS headers and answer preflights
    // with 204, so they stay outside `CorsLayer`.
    let discovery = Router::new()
        .route(
            "/.well-known/oauth-protected-resource",
            get(handlers::handle_protected_resource).options(handlers::handle_metadata_preflight),
        )
        .route(
            "/.well-known/oauth-authorization-server",
            get(handlers::handle_auth_server_metadata).options(handlers::handle_metadata_preflight),
        );

    let api = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/jwks", get(handlers::handle_jwks))
        // Authorization server
        .route("/register", post(handlers::handle_register))
        .route("/authorize", get(authorize::handle_authorize))
        .route(&config.callback_path, get(authorize::handle_callback))
        .route("/token", post(token::handle_token))
        .merge(protected)
        .layer(CorsLayer::permissive());

    Router::new()
        .merge(discovery)
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn readiness_check(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let stats = state.oauth.stats().await;
    Json(serde_json::json!({
        "status": "ready",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "clients": stats.clients,
        "pending_authorizations": stats.pending,
        "active_tokens": stats.access_tokens,
        "upstream_authorized": stats.has_upstream_token
    }))
}

/// `GET|POST /mcp`
///
/// Reports the identity behind the presented bearer token.
async fn handle_mcp(Extension(token): Extension<VerifiedToken>) -> impl IntoResponse {
    tracing::debug!(client_id = %token.client_id, "Authenticated MCP request");

    Json(serde_json::json!({
        "client_id": token.client_id,
        "expires_in": token.expires_in().as_secs()
    }))
}
