//! Workflowy MCP Server - Entry Point

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use workflowy_mcp::{config::Config, server::McpServer};

#[derive(Parser, Debug)]
#[command(name = "workflowy-mcp")]
#[command(about = "MCP server for Workflowy with an embedded OAuth 2.0 authorization server")]
#[command(version)]
struct Cli {
    /// HTTP server port
    #[arg(long, default_value = "8000", env = "PORT")]
    port: u16,

    /// Issuer URL advertised in OAuth metadata (e.g., https://mcp.example.com)
    #[arg(long, env = "OAUTH_ISSUER")]
    issuer: Option<String>,

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
    // Load .env before reading any configuration
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Workflowy MCP server");

    let mut config = Config::from_env()?;
    if let Some(issuer) = cli.issuer {
        config.issuer = issuer;
    }

    // Fail fast: a server without key material cannot issue a single token,
    // so there is no point accepting connections
    if config.encryption_key.is_none() {
        anyhow::bail!("ENCRYPTION_KEY is not configured (64-character hex string required)");
    }
    if config.jwt_secret.is_none() {
        anyhow::bail!("JWT_SECRET is not configured");
    }
    if config.registration_secret.is_none() {
        tracing::warn!(
            "OAUTH_REGISTRATION_SECRET is not set; dynamic client registration is open to anyone"
        );
    }

    McpServer::new(config).run_http(cli.port).await
}
