//! MCP server implementation.
//!
//! HTTP only: the OAuth flow needs a browser-reachable consent page, so a
//! stdio transport would not be able to complete authorization.

pub mod transport;

use std::net::SocketAddr;

use crate::config::Config;

/// MCP server for Workflowy.
pub struct McpServer {
    config: Config,
}

impl McpServer {
    /// Create a new MCP server.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the server in HTTP mode.
    ///
    /// # Errors
    ///
    /// Returns error when the router cannot be built (missing key material)
    /// or on server failure.
    pub async fn run_http(self, port: u16) -> anyhow::Result<()> {
        tracing::info!(port, issuer = %self.config.issuer, "Starting MCP server in HTTP mode");

        let router = transport::create_router(&self.config)?;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tracing::info!("HTTP server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer").field("issuer", &self.config.issuer).finish()
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
