//! OAuth 2.0 records held by the proxy.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// A dynamically registered OAuth client.
#[derive(Clone)]
pub struct RegisteredClient {
    pub client_id: String,
    pub client_secret: String,
    pub client_name: Option<String>,
    pub redirect_uris: Vec<String>,
    pub issued_at: DateTime<Utc>,
}

impl RegisteredClient {
    /// Exact string match against the registered redirect URIs.
    #[must_use]
    pub fn allows_redirect(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == redirect_uri)
    }
}

impl std::fmt::Debug for RegisteredClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredClient")
            .field("client_id", &self.client_id)
            .field("client_name", &self.client_name)
            .field("redirect_uris", &self.redirect_uris)
            .finish()
    }
}

/// The client-side half of an authorization, carried from `/authorize`
/// through the upstream round trip into the authorization code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationFlow {
    pub client_id: String,
    pub redirect_uri: String,
    /// The client's own `state`, echoed back on the final redirect.
    pub client_state: Option<String>,
    pub code_challenge: String,
}

/// An authorization parked while the user is at the upstream provider.
#[derive(Debug)]
pub struct PendingAuthorization {
    pub flow: AuthorizationFlow,
    pub created_at: Instant,
}

impl PendingAuthorization {
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// A single-use authorization code minted after the upstream callback.
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    pub client_id: String,
    pub redirect_uri: String,
    pub code_challenge: String,
    pub created_at: Instant,
}

impl AuthorizationCode {
    pub fn from_flow(flow: &AuthorizationFlow) -> Self {
        Self {
            client_id: flow.client_id.clone(),
            redirect_uri: flow.redirect_uri.clone(),
            code_challenge: flow.code_challenge.clone(),
            created_at: Instant::now(),
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// An opaque bearer token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub client_id: String,
    pub expires_at: Instant,
}

impl AccessToken {
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// A refresh token. Rotated on every use.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub client_id: String,
    /// Access token issued alongside this refresh token.
    pub access_token: String,
}

/// The credential obtained from the upstream provider.
///
/// There is exactly one per process; every MCP client shares it.
#[derive(Clone)]
pub struct UpstreamToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    pub obtained_at: DateTime<Utc>,
}

impl UpstreamToken {
    /// Whether the provider access token has passed its advertised expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

impl std::fmt::Debug for UpstreamToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamToken")
            .field("token_type", &self.token_type)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

/// Result of a successful bearer token verification.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub client_id: String,
    pub expires_at: Instant,
}

impl VerifiedToken {
    /// Remaining lifetime.
    #[must_use]
    pub fn expires_in(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// A freshly issued access + refresh pair.
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}
