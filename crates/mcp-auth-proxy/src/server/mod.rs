//! MCP authorization proxy server.
//!
//! Wires the OAuth store, the upstream provider client and the HTTP router,
//! and runs the background sweeper for expired records.

pub mod oauth;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;

use crate::config::Config;
use oauth::{HttpUpstream, OAuthStore, UpstreamProvider};

/// Authorization proxy server.
pub struct ProxyServer {
    config: Config,
    store: OAuthStore,
    upstream: Arc<dyn UpstreamProvider>,
}

impl ProxyServer {
    /// Create a server talking to the configured upstream provider over HTTP.
    ///
    /// # Errors
    ///
    /// Returns error if the upstream HTTP client cannot be built.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let upstream = Arc::new(HttpUpstream::new(&config)?);
        Ok(Self::with_upstream(config, upstream))
    }

    /// Create a server with a custom upstream provider.
    #[must_use]
    pub fn with_upstream(config: Config, upstream: Arc<dyn UpstreamProvider>) -> Self {
        Self { config, store: OAuthStore::new(), upstream }
    }

    /// Shared OAuth store.
    #[must_use]
    pub const fn store(&self) -> &OAuthStore {
        &self.store
    }

    /// Build the HTTP router without starting the sweeper.
    #[must_use]
    pub fn router(&self) -> Router {
        transport::create_router(&self.config, self.store.clone(), Arc::clone(&self.upstream))
    }

    /// Run the server in HTTP mode until Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns error on bind or server failure.
    pub async fn run_http(self, port: u16) -> anyhow::Result<()> {
        tracing::info!(
            base_url = %self.config.base_url,
            callback = %self.config.callback_url(),
            "Starting MCP authorization proxy on port {}",
            port
        );

        let sweeper = self.store.start_cleanup_task();
        let router = self.router();
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tracing::info!("HTTP server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let served = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await;

        sweeper.abort();
        served?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }
}

impl std::fmt::Debug for ProxyServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyServer").field("config", &self.config).finish()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
