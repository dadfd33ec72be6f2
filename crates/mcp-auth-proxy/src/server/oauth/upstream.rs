//! Upstream identity provider client.
//!
//! The proxy is an OAuth client of exactly one provider. `UpstreamProvider` is the
//! seam the callback handler talks to; `HttpUpstream` is the real implementation.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;

use super::types::UpstreamToken;
use crate::config::{Config, UpstreamConfig};
use crate::error::{UpstreamError, UpstreamResult};

/// Longest provider error body echoed into an error.
const MAX_ERROR_BODY: usize = 200;

/// An OAuth 2.0 provider the proxy delegates sign-in to.
#[async_trait]
pub trait UpstreamProvider: Send + Sync {
    /// URL to send the user's browser to, carrying our opaque `state`.
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange a provider authorization code for a provider token.
    async fn exchange_code(&self, code: &str) -> UpstreamResult<UpstreamToken>;
}

/// Provider token endpoint response. Some providers answer 200 with an `error` body.
#[derive(Debug, Deserialize)]
struct ProviderTokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Provider reached over HTTP with `client_secret_post` authentication.
pub struct HttpUpstream {
    client: Client,
    config: UpstreamConfig,
    redirect_uri: String,
}

impl HttpUpstream {
    /// Create a provider client from the server configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.upstream.request_timeout)
            .connect_timeout(config.upstream.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            config: config.upstream.clone(),
            redirect_uri: config.callback_url(),
        })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.config.request_timeout)
        } else {
            UpstreamError::Http(err)
        }
    }
}

#[async_trait]
impl UpstreamProvider for HttpUpstream {
    fn authorization_url(&self, state: &str) -> String {
        let mut url = self.config.authorization_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", &self.redirect_uri);
            if !self.config.scopes.is_empty() {
                query.append_pair("scope", &self.config.scopes.join(" "));
            }
            query
                .append_pair("state", state)
                // Refresh-capable upstream token even when the user has consented before.
                .append_pair("access_type", "offline")
                .append_pair("prompt", "consent");
        }
        url.into()
    }

    async fn exchange_code(&self, code: &str) -> UpstreamResult<UpstreamToken> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(self.config.token_url.clone())
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_transport_error(e))?;
        let parsed = serde_json::from_str::<ProviderTokenResponse>(&body);

        if !status.is_success() {
            return Err(match parsed {
                Ok(ProviderTokenResponse { error: Some(error), error_description, .. }) => {
                    UpstreamError::provider(status.as_u16(), error, error_description)
                }
                _ => UpstreamError::provider(status.as_u16(), truncate(&body), None),
            });
        }

        let token = parsed.map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;
        if let Some(error) = token.error {
            return Err(UpstreamError::provider(status.as_u16(), error, token.error_description));
        }

        let access_token = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| UpstreamError::InvalidResponse("missing access_token".to_string()))?;

        let obtained_at = Utc::now();
        let expires_at = token
            .expires_in
            .filter(|secs| *secs > 0)
            .and_then(chrono::TimeDelta::try_seconds)
            .and_then(|ttl| obtained_at.checked_add_signed(ttl));

        Ok(UpstreamToken {
            access_token,
            refresh_token: token.refresh_token,
            token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at,
            scope: token.scope,
            obtained_at,
        })
    }
}

impl std::fmt::Debug for HttpUpstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpUpstream")
            .field("token_url", &self.config.token_url.as_str())
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}
