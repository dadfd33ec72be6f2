//! Configuration for the MCP authorization proxy.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::Context;
use url::Url;

/// OAuth lifetime and housekeeping constants.
pub mod oauth {
    use std::time::Duration;

    /// Authorization code lifetime (10 minutes).
    pub const AUTH_CODE_TTL: Duration = Duration::from_secs(600);

    /// Pending authorization lifetime while the user is at the upstream provider (10 minutes).
    pub const PENDING_TTL: Duration = Duration::from_secs(600);

    /// Access token lifetime (1 hour).
    pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(3600);

    /// Cleanup sweep interval (5 minutes).
    pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

    /// Upper bound on the upstream code exchange.
    pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection timeout for the upstream provider.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Path the upstream provider redirects back to.
    pub const DEFAULT_CALLBACK_PATH: &str = "/oauth/callback";

    /// Dynamic client registrations accepted per minute, process-wide.
    pub const REGISTRATIONS_PER_MINUTE: u32 = 30;
}

/// Upstream identity provider settings.
#[derive(Clone)]
pub struct UpstreamConfig {
    /// Client ID this proxy is registered under at the provider.
    pub client_id: String,

    /// Client secret for the provider token endpoint.
    pub client_secret: String,

    /// Provider authorization endpoint.
    pub authorization_url: Url,

    /// Provider token endpoint.
    pub token_url: Url,

    /// Scopes requested from the provider.
    pub scopes: Vec<String>,

    /// Request timeout for the code exchange.
    pub request_timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("client_id", &self.client_id)
            .field("authorization_url", &self.authorization_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Public base URL of this server, without trailing slash. Used as issuer and resource.
    pub base_url: String,

    /// Path of the upstream callback route.
    pub callback_path: String,

    /// Upstream provider settings.
    pub upstream: UpstreamConfig,

    /// Dynamic client registrations accepted per minute.
    pub registrations_per_minute: NonZeroU32,
}

impl Config {
    /// Create a configuration, validating URLs and the callback path.
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is not absolute or the callback path is not rooted.
    pub fn new(base_url: &str, upstream: UpstreamConfig) -> anyhow::Result<Self> {
        let parsed = Url::parse(base_url).with_context(|| format!("invalid base URL: {base_url}"))?;
        if parsed.cannot_be_a_base() {
            anyhow::bail!("base URL must be absolute: {base_url}");
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            callback_path: oauth::DEFAULT_CALLBACK_PATH.to_string(),
            upstream,
            registrations_per_minute: NonZeroU32::new(oauth::REGISTRATIONS_PER_MINUTE)
                .unwrap_or(NonZeroU32::MIN),
        })
    }

    /// Override the callback path.
    ///
    /// # Errors
    ///
    /// Returns error if the path does not start with `/`.
    pub fn with_callback_path(mut self, path: impl Into<String>) -> anyhow::Result<Self> {
        let path = path.into();
        if !path.starts_with('/') || path.len() < 2 {
            anyhow::bail!("callback path must start with '/': {path}");
        }
        self.callback_path = path;
        Ok(self)
    }

    /// Create a test configuration pointing the upstream provider at a mock server.
    ///
    /// # Panics
    ///
    /// Panics if `upstream_base` is not a valid URL.
    #[must_use]
    pub fn for_testing(upstream_base: &str) -> Self {
        let upstream_base = upstream_base.trim_end_matches('/');
        let upstream = UpstreamConfig {
            client_id: "proxy-client".to_string(),
            client_secret: "proxy-secret".to_string(),
            authorization_url: Url::parse(&format!("{upstream_base}/authorize"))
                .expect("valid test authorization URL"),
            token_url: Url::parse(&format!("{upstream_base}/token")).expect("valid test token URL"),
            scopes: vec!["catalog.read".to_string()],
            request_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
        };

        Self {
            base_url: "https://proxy.example".to_string(),
            callback_path: oauth::DEFAULT_CALLBACK_PATH.to_string(),
            upstream,
            registrations_per_minute: NonZeroU32::new(1000).unwrap_or(NonZeroU32::MIN),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Reads `MCP_BASE_URL`, `OAUTH_CALLBACK_PATH`, `UPSTREAM_CLIENT_ID`,
    /// `UPSTREAM_CLIENT_SECRET`, `UPSTREAM_AUTH_URL`, `UPSTREAM_TOKEN_URL` and
    /// `UPSTREAM_SCOPES` (space separated). A `.env` file is honoured if present.
    ///
    /// # Errors
    ///
    /// Returns error if a required variable is missing or a URL is invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let base_url = std::env::var("MCP_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
        let upstream = UpstreamConfig {
            client_id: required_env("UPSTREAM_CLIENT_ID")?,
            client_secret: required_env("UPSTREAM_CLIENT_SECRET")?,
            authorization_url: required_url("UPSTREAM_AUTH_URL")?,
            token_url: required_url("UPSTREAM_TOKEN_URL")?,
            scopes: std::env::var("UPSTREAM_SCOPES")
                .map(|s| parse_scopes(&s))
                .unwrap_or_default(),
            request_timeout: oauth::UPSTREAM_TIMEOUT,
            connect_timeout: oauth::CONNECT_TIMEOUT,
        };

        let config = Self::new(&base_url, upstream)?;
        match std::env::var("OAUTH_CALLBACK_PATH") {
            Ok(path) => config.with_callback_path(path),
            Err(_) => Ok(config),
        }
    }

    /// Absolute URL the upstream provider redirects to.
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.base_url, self.callback_path)
    }

    /// RFC 9728 metadata URL advertised in `WWW-Authenticate`.
    #[must_use]
    pub fn resource_metadata_url(&self) -> String {
        format!("{}/.well-known/oauth-protected-resource", self.base_url)
    }
}

fn required_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("{name} must be set"))
}

fn required_url(name: &str) -> anyhow::Result<Url> {
    let raw = required_env(name)?;
    Url::parse(&raw).with_context(|| format!("{name} is not a valid URL: {raw}"))
}

fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let upstream = Config::for_testing("http://upstream.localhost").upstream;
        let config = Config::new("https://mcp.example/", upstream).unwrap();
        assert_eq!(config.base_url, "https://mcp.example");
        assert_eq!(config.callback_url(), "https://mcp.example/oauth/callback");
        assert_eq!(
            config.resource_metadata_url(),
            "https://mcp.example/.well-known/oauth-protected-resource"
        );
    }

    #[test]
    fn test_relative_base_url_rejected() {
        let upstream = Config::for_testing("http://upstream.localhost").upstream;
        assert!(Config::new("/just/a/path", upstream).is_err());
    }

    #[test]
    fn test_callback_path_must_be_rooted() {
        let config = Config::for_testing("http://upstream.localhost");
        assert!(config.clone().with_callback_path("callback").is_err());
        assert!(config.clone().with_callback_path("/").is_err());

        let config = config.with_callback_path("/auth/provider/callback").unwrap();
        assert_eq!(config.callback_url(), "https://proxy.example/auth/provider/callback");
    }

    #[test]
    fn test_scopes_split_on_whitespace() {
        assert_eq!(parse_scopes("  a  b\tc "), vec!["a", "b", "c"]);
        assert!(parse_scopes("").is_empty());
    }

    #[test]
    fn test_debug_redacts_upstream_secret() {
        let config = Config::for_testing("http://upstream.localhost");
        let debug = format!("{config:?}");
        assert!(!debug.contains("proxy-secret"));
        assert!(debug.contains("proxy-client"));
    }
}
