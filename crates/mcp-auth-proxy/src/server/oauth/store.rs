//! In-memory OAuth store.
//!
//! All maps and the upstream token live behind one mutex. Every critical section
//! is O(1) map work; nothing awaits I/O while holding the lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::types::{
    AccessToken, AuthorizationCode, AuthorizationFlow, PendingAuthorization, RefreshToken,
    RegisteredClient, TokenPair, UpstreamToken, VerifiedToken,
};
use crate::config::oauth::{ACCESS_TOKEN_TTL, AUTH_CODE_TTL, CLEANUP_INTERVAL, PENDING_TTL};
use crate::error::{OAuthError, OAuthResult};

#[derive(Default)]
struct OAuthState {
    clients: HashMap<String, RegisteredClient>,
    pending: HashMap<String, PendingAuthorization>,
    auth_codes: HashMap<String, AuthorizationCode>,
    access_tokens: HashMap<String, AccessToken>,
    refresh_tokens: HashMap<String, RefreshToken>,
    upstream: Option<UpstreamToken>,
}

/// In-memory OAuth state store. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct OAuthStore {
    state: Arc<Mutex<OAuthState>>,
}

/// Entry counts, for readiness reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub clients: usize,
    pub pending: usize,
    pub auth_codes: usize,
    pub access_tokens: usize,
    pub refresh_tokens: usize,
    pub has_upstream_token: bool,
}

/// Entries removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    pub pending: usize,
    pub auth_codes: usize,
    pub access_tokens: usize,
}

impl OAuthStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a random token using two UUIDs (244 random bits).
    fn generate_token() -> String {
        format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
    }

    // ─── Client registry ─────────────────────────────────────────────────────

    /// Register a new OAuth client (Dynamic Client Registration).
    pub async fn register_client(
        &self,
        client_name: Option<String>,
        redirect_uris: Vec<String>,
    ) -> RegisteredClient {
        let client = RegisteredClient {
            client_id: uuid::Uuid::new_v4().simple().to_string(),
            client_secret: Self::generate_token(),
            client_name,
            redirect_uris,
            issued_at: Utc::now(),
        };

        self.state
            .lock()
            .await
            .clients
            .insert(client.client_id.clone(), client.clone());

        client
    }

    /// Look up a client by ID.
    pub async fn get_client(&self, client_id: &str) -> Option<RegisteredClient> {
        self.state.lock().await.clients.get(client_id).cloned()
    }

    /// Authenticate a client by ID and secret (`client_secret_post`).
    pub async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> OAuthResult<RegisteredClient> {
        let Some(client) = self.get_client(client_id).await else {
            return Err(OAuthError::invalid_client("unknown client"));
        };

        if !super::pkce::constant_time_eq(client.client_secret.as_bytes(), client_secret.as_bytes()) {
            return Err(OAuthError::invalid_client("client authentication failed"));
        }

        Ok(client)
    }

    // ─── Authorization flow ──────────────────────────────────────────────────

    /// Park a validated authorization while the user visits the upstream provider.
    ///
    /// Returns the opaque state to send upstream.
    pub async fn begin_authorization(&self, flow: AuthorizationFlow) -> String {
        let upstream_state = Self::generate_token();

        self.state.lock().await.pending.insert(
            upstream_state.clone(),
            PendingAuthorization { flow, created_at: Instant::now() },
        );

        upstream_state
    }

    /// Remove the pending authorization for an upstream state.
    ///
    /// The record is deleted whether or not it has expired; expired records yield `None`.
    pub async fn take_pending(&self, upstream_state: &str) -> Option<AuthorizationFlow> {
        let pending = self.state.lock().await.pending.remove(upstream_state)?;

        if pending.is_expired(PENDING_TTL) {
            tracing::debug!(client_id = %pending.flow.client_id, "Pending authorization expired");
            return None;
        }

        Some(pending.flow)
    }

    /// Store the upstream token and mint an authorization code for the flow.
    pub async fn complete_authorization(
        &self,
        flow: &AuthorizationFlow,
        upstream: UpstreamToken,
    ) -> String {
        let code = Self::generate_token();

        let mut state = self.state.lock().await;
        state.upstream = Some(upstream);
        state.auth_codes.insert(code.clone(), AuthorizationCode::from_flow(flow));

        code
    }

    /// The current upstream credential, if any authorization has completed.
    pub async fn upstream_token(&self) -> Option<UpstreamToken> {
        self.state.lock().await.upstream.clone()
    }

    // ─── Codes and tokens ────────────────────────────────────────────────────

    /// Remove an authorization code. Validation is the caller's job; the code is
    /// gone either way, so a failed attempt cannot be retried.
    pub async fn take_auth_code(&self, code: &str) -> Option<AuthorizationCode> {
        self.state.lock().await.auth_codes.remove(code)
    }

    /// Remove a refresh token together with the access token issued beside it.
    pub async fn take_refresh_token(&self, refresh_token: &str) -> Option<RefreshToken> {
        let mut state = self.state.lock().await;
        let old = state.refresh_tokens.remove(refresh_token)?;
        state.access_tokens.remove(&old.access_token);
        Some(old)
    }

    /// Create an access + refresh token pair.
    pub async fn issue_token_pair(&self, client_id: &str) -> TokenPair {
        let access = Self::generate_token();
        let refresh = Self::generate_token();

        let mut state = self.state.lock().await;
        state.access_tokens.insert(
            access.clone(),
            AccessToken {
                client_id: client_id.to_owned(),
                expires_at: Instant::now() + ACCESS_TOKEN_TTL,
            },
        );
        state.refresh_tokens.insert(
            refresh.clone(),
            RefreshToken { client_id: client_id.to_owned(), access_token: access.clone() },
        );

        TokenPair {
            access_token: access,
            refresh_token: refresh,
            expires_in: ACCESS_TOKEN_TTL.as_secs(),
        }
    }

    /// Resolve a bearer token. Expired tokens are deleted on sight.
    pub async fn verify_access_token(&self, token: &str) -> OAuthResult<VerifiedToken> {
        let mut state = self.state.lock().await;

        let Some(access) = state.access_tokens.get(token) else {
            return Err(OAuthError::invalid_token("unknown access token"));
        };

        if access.is_expired() {
            state.access_tokens.remove(token);
            return Err(OAuthError::invalid_token("access token expired"));
        }

        Ok(VerifiedToken { client_id: access.client_id.clone(), expires_at: access.expires_at })
    }

    // ─── Housekeeping ────────────────────────────────────────────────────────

    /// Entry counts.
    pub async fn stats(&self) -> StoreStats {
        let state = self.state.lock().await;
        StoreStats {
            clients: state.clients.len(),
            pending: state.pending.len(),
            auth_codes: state.auth_codes.len(),
            access_tokens: state.access_tokens.len(),
            refresh_tokens: state.refresh_tokens.len(),
            has_upstream_token: state.upstream.is_some(),
        }
    }

    /// Start background cleanup task for expired pending records, codes and tokens.
    pub fn start_cleanup_task(&self) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                store.purge_expired().await;
            }
        })
    }

    /// Delete expired pending authorizations, codes and access tokens.
    pub async fn purge_expired(&self) -> PurgeStats {
        let mut state = self.state.lock().await;

        let before = (state.pending.len(), state.auth_codes.len(), state.access_tokens.len());
        state.pending.retain(|_, p| !p.is_expired(PENDING_TTL));
        state.auth_codes.retain(|_, c| !c.is_expired(AUTH_CODE_TTL));
        state.access_tokens.retain(|_, t| !t.is_expired());

        let stats = PurgeStats {
            pending: before.0 - state.pending.len(),
            auth_codes: before.1 - state.auth_codes.len(),
            access_tokens: before.2 - state.access_tokens.len(),
        };

        if stats != PurgeStats::default() {
            tracing::debug!(
                pending = stats.pending,
                auth_codes = stats.auth_codes,
                access_tokens = stats.access_tokens,
                "Cleaned up expired OAuth records"
            );
        }

        stats
    }
}

impl std::fmt::Debug for OAuthStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthStore").finish()
    }
}
