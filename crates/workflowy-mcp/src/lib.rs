//! Workflowy MCP Server
//!
//! A Model Context Protocol (MCP) server for the Workflowy API with an
//! embedded OAuth 2.0 authorization server. Lets LLM agents read and write a
//! user's Workflowy outline after the user hands over an API key through a
//! standard authorization-code flow.
//!
//! # Features
//!
//! - **14 MCP Tools**: bookmarks plus node reads, writes, moves, completion
//! - **Embedded OAuth**: dynamic client registration, PKCE, refresh rotation
//! - **Credential custody**: Workflowy API keys are stored encrypted and
//!   travel only inside signed access tokens
//!
//! # Example
//!
//! ```no_run
//! use workflowy_mcp::{config::Config, server::McpServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     McpServer::new(config).run_http(8000).await
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod oauth;
pub mod server;
pub mod tools;

pub use client::WorkflowyClient;
pub use config::Config;
pub use error::{ClientError, CryptoError, ToolError};
