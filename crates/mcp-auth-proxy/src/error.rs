//! Error types for the MCP authorization proxy.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! `OAuthError` renders as the RFC 6749 §5.2 JSON error shape.

use std::time::Duration;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

/// Errors from the upstream identity provider.
#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Exchange did not complete within the configured timeout
    #[error("Upstream request timed out after {0:?}")]
    Timeout(Duration),

    /// Provider rejected the exchange
    #[error("Provider error ({status}): {error}")]
    Provider {
        /// HTTP status code
        status: u16,
        /// OAuth error code from the provider, or the raw body
        error: String,
        /// Optional provider description
        description: Option<String>,
    },

    /// Provider answered 2xx with a body we could not use
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// A provider URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl UpstreamError {
    /// Create a provider error.
    #[must_use]
    pub fn provider(status: u16, error: impl Into<String>, description: Option<String>) -> Self {
        Self::Provider { status, error: error.into(), description }
    }
}

/// OAuth protocol errors surfaced to MCP clients.
#[derive(thiserror::Error, Debug)]
pub enum OAuthError {
    /// Missing or malformed request parameter
    #[error("{0}")]
    InvalidRequest(String),

    /// Client authentication failed or client is unknown
    #[error("{0}")]
    InvalidClient(String),

    /// Registration body rejected
    #[error("{0}")]
    InvalidClientMetadata(String),

    /// Code or refresh token invalid, expired, reused, or bound elsewhere
    #[error("{0}")]
    InvalidGrant(String),

    /// grant_type not supported by this server
    #[error("unsupported grant_type: {0}")]
    UnsupportedGrantType(String),

    /// Bearer token unknown or expired
    #[error("{0}")]
    InvalidToken(String),

    /// Too many requests against a rate-limited endpoint
    #[error("too many requests, retry later")]
    SlowDown,

    /// Upstream provider exchange failed
    #[error("upstream authorization failed: {0}")]
    Upstream(#[from] UpstreamError),
}

impl OAuthError {
    /// Create an invalid_request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an invalid_client error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient(message.into())
    }

    /// Create an invalid_grant error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant(message.into())
    }

    /// Create an invalid_token error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken(message.into())
    }

    /// OAuth error code for the `error` field.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidClientMetadata(_) => "invalid_client_metadata",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::InvalidToken(_) => "invalid_token",
            Self::SlowDown => "slow_down",
            Self::Upstream(_) => "server_error",
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidClient(_) | Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::SlowDown => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Description safe to show to clients. Upstream details stay in the logs.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Upstream(_) => {
                "the identity provider did not complete sign-in; start the authorization again"
                    .to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let mut response = (
            self.status(),
            Json(serde_json::json!({
                "error": self.error_code(),
                "error_description": self.description()
            })),
        )
            .into_response();

        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
    }
}

/// Result type alias for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Result type alias for OAuth operations.
pub type OAuthResult<T> = Result<T, OAuthError>;
