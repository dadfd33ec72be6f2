//! MCP Authorization Proxy
//!
//! An OAuth 2.0 authorization server for MCP clients that delegates user sign-in
//! to a single upstream identity provider.
//!
//! # Features
//!
//! - **Discovery**: RFC 9728 protected resource and RFC 8414 server metadata
//! - **Dynamic registration**: RFC 7591, rate limited
//! - **PKCE**: S256 only
//! - **Opaque tokens**: one-hour access tokens, single-use rotating refresh tokens
//! - **In-memory**: all state lives in one store, swept periodically
//!
//! # Example
//!
//! ```no_run
//! use mcp_auth_proxy::{config::Config, server::ProxyServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     ProxyServer::new(config)?.run_http(8000).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod server;

pub use config::Config;
pub use error::{OAuthError, UpstreamError};
pub use server::ProxyServer;
pub use server::oauth::OAuthStore;
