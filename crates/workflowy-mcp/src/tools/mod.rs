//! MCP tool implementations.
//!
//! Each tool module provides tools that:
//! 1. Parse and validate input parameters
//! 2. Call the Workflowy API client or the bookmark store
//! 3. Return results as JSON text

pub mod bookmarks;
pub mod nodes;

pub use bookmarks::BookmarkStore;

use std::sync::Arc;

use crate::client::WorkflowyClient;
use crate::error::{ToolError, ToolResult};

/// Tool execution context, built per request.
///
/// The Workflowy API key comes from the verified bearer token of the request
/// being served, so concurrent requests for different users never observe
/// each other's credentials.
pub struct ToolContext {
    /// API key of the user this request acts for.
    pub api_key: String,

    /// API client.
    pub client: Arc<WorkflowyClient>,

    /// Bookmark store.
    pub bookmarks: BookmarkStore,
}

/// Trait for MCP tools.
#[async_trait::async_trait]
pub trait McpTool: Send + Sync {
    /// Tool name (e.g., "save_bookmark").
    fn name(&self) -> &'static str;

    /// Tool description for LLM.
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with given input.
    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult<String>;
}

/// Register all tools.
#[must_use]
pub fn register_all_tools() -> Vec<Box<dyn McpTool>> {
    let mut tools: Vec<Box<dyn McpTool>> = vec![
        // Bookmark tools (4)
        Box::new(bookmarks::SaveBookmarkTool),
        Box::new(bookmarks::GetBookmarkTool),
        Box::new(bookmarks::ListBookmarksTool),
        Box::new(bookmarks::DeleteBookmarkTool),
    ];
    // Workflowy node tools (10)
    tools.extend(nodes::node_tools());
    tools
}

/// Extract a required string argument from tool input.
pub(crate) fn required_str<'a>(input: &'a serde_json::Value, field: &str) -> ToolResult<&'a str> {
    input
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::validation(field, format!("'{field}' is required")))
}
