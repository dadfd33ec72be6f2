//! OAuth 2.0 authorization server for MCP clients.
//!
//! The proxy is an authorization server to its MCP clients and an OAuth client
//! of one upstream identity provider. Clients never see upstream tokens; they
//! receive opaque tokens issued here.
//!
//! ## Supported Standards
//! - RFC 9728: OAuth Protected Resource Metadata
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7636: PKCE (S256 only)
//! - RFC 6749: Authorization Code and Refresh Token Grants
//! - RFC 6750: Bearer Token Usage

pub mod authorize;
pub mod handlers;
pub mod middleware;
pub mod pages;
pub mod pkce;
pub mod store;
pub mod token;
pub mod types;
pub mod upstream;

pub use store::OAuthStore;
pub use types::{UpstreamToken, VerifiedToken};
pub use upstream::{HttpUpstream, UpstreamProvider};
