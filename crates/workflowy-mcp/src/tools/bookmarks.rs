//! Bookmark tools: save, get, list, and delete named node references.
//!
//! Bookmarks map a friendly name to a Workflowy node UUID so conversations
//! can refer to "work_tasks" instead of pasting UUIDs around.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;

use super::{McpTool, ToolContext, required_str};
use crate::error::ToolResult;

/// A saved bookmark.
#[derive(Debug, Clone, Serialize)]
pub struct Bookmark {
    pub name: String,
    pub node_id: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory bookmark store.
#[derive(Clone, Default)]
pub struct BookmarkStore {
    entries: Arc<RwLock<HashMap<String, Bookmark>>>,
}

impl BookmarkStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Save a bookmark, replacing any existing one with the same name.
    pub async fn save(&self, name: &str, node_id: &str) {
        self.entries.write().await.insert(
            name.to_string(),
            Bookmark {
                name: name.to_string(),
                node_id: node_id.to_string(),
                created_at: Utc::now(),
            },
        );
    }

    /// Look up a bookmark by name.
    pub async fn get(&self, name: &str) -> Option<Bookmark> {
        self.entries.read().await.get(name).cloned()
    }

    /// List all bookmarks, sorted by name.
    pub async fn list(&self) -> Vec<Bookmark> {
        let mut all: Vec<Bookmark> = self.entries.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Delete a bookmark. Returns whether it existed.
    pub async fn delete(&self, name: &str) -> bool {
        self.entries.write().await.remove(name).is_some()
    }
}

impl std::fmt::Debug for BookmarkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookmarkStore").finish()
    }
}

/// Save a node ID under a friendly name.
pub struct SaveBookmarkTool;

#[async_trait::async_trait]
impl McpTool for SaveBookmarkTool {
    fn name(&self) -> &'static str {
        "save_bookmark"
    }

    fn description(&self) -> &'static str {
        "Save a Workflowy node ID with a friendly name for easy reference later. \
         Check similar bookmarks before creating a new one to avoid duplicates."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "A friendly name for the bookmark (e.g., 'special_inbox', 'work_tasks')"
                },
                "node_id": {
                    "type": "string",
                    "description": "The Workflowy node UUID to bookmark"
                }
            },
            "required": ["name", "node_id"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult<String> {
        let name = required_str(&input, "name")?;
        let node_id = required_str(&input, "node_id")?;

        ctx.bookmarks.save(name, node_id).await;
        Ok(format!("Bookmark \"{name}\" saved with node ID: {node_id}"))
    }
}

/// Look up a bookmarked node ID.
pub struct GetBookmarkTool;

#[async_trait::async_trait]
impl McpTool for GetBookmarkTool {
    fn name(&self) -> &'static str {
        "get_bookmark"
    }

    fn description(&self) -> &'static str {
        "Get a saved Workflowy node ID by its bookmark name. Use this to retrieve \
         node IDs for bookmarked locations before creating or moving nodes."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "The bookmark name to look up"
                }
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult<String> {
        let name = required_str(&input, "name")?;

        match ctx.bookmarks.get(name).await {
            Some(bookmark) => Ok(serde_json::to_string(&json!({
                "name": bookmark.name,
                "node_id": bookmark.node_id
            }))?),
            None => Ok(format!("Bookmark \"{name}\" not found")),
        }
    }
}

/// List all bookmarks.
pub struct ListBookmarksTool;

#[async_trait::async_trait]
impl McpTool for ListBookmarksTool {
    fn name(&self) -> &'static str {
        "list_bookmarks"
    }

    fn description(&self) -> &'static str {
        "List all saved Workflowy bookmarks. Use this to see what locations have been bookmarked."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, ctx: &ToolContext, _input: serde_json::Value) -> ToolResult<String> {
        let all = ctx.bookmarks.list().await;
        Ok(serde_json::to_string_pretty(&all)?)
    }
}

/// Delete a bookmark by name.
pub struct DeleteBookmarkTool;

#[async_trait::async_trait]
impl McpTool for DeleteBookmarkTool {
    fn name(&self) -> &'static str {
        "delete_bookmark"
    }

    fn description(&self) -> &'static str {
        "Delete a saved bookmark by name."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "The bookmark name to delete"
                }
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult<String> {
        let name = required_str(&input, "name")?;

        if ctx.bookmarks.delete(name).await {
            Ok(format!("Bookmark \"{name}\" deleted"))
        } else {
            Ok(format!("Bookmark \"{name}\" not found"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_overwrites() {
        let store = BookmarkStore::new();
        store.save("inbox", "node-1").await;
        store.save("inbox", "node-2").await;

        assert_eq!(store.get("inbox").await.unwrap().node_id, "node-2");
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_list_sorted() {
        let store = BookmarkStore::new();
        store.save("zeta", "n1").await;
        store.save("alpha", "n2").await;

        let names: Vec<String> = store.list().await.into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = BookmarkStore::new();
        store.save("inbox", "node-1").await;

        assert!(store.delete("inbox").await);
        assert!(!store.delete("inbox").await);
        assert!(store.get("inbox").await.is_none());
    }
}
