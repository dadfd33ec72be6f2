//! MCP Authorization Proxy - Entry Point

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mcp_auth_proxy::{config::Config, server::ProxyServer};

#[derive(Parser, Debug)]
#[command(name = "mcp-auth-proxy")]
#[command(about = "OAuth 2.0 authorization server for MCP clients, backed by one upstream provider")]
#[command(version)]
struct Cli {
    /// HTTP server port
    #[arg(long, default_value = "8000", env = "PORT")]
    port: u16,

    /// Public base URL (e.g., https://mcp.example.com); overrides MCP_BASE_URL from .env
    #[arg(long, env = "MCP_BASE_URL")]
    base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting MCP authorization proxy");

    let mut config = Config::from_env()?;
    if let Some(base_url) = cli.base_url {
        config = Config::new(&base_url, config.upstream)?.with_callback_path(config.callback_path)?;
    }

    let server = ProxyServer::new(config)?;
    server.run_http(cli.port).await
}
