//! Workflowy node tools: reads, writes, moves, and completion toggles.
//!
//! These tools are thin proxies over the Workflowy REST API. Each one maps
//! its arguments to a request and returns the response envelope verbatim, so
//! the caller sees exactly what Workflowy answered, including upstream
//! errors.

use reqwest::Method;
use serde_json::json;

use super::{McpTool, ToolContext, required_str};
use crate::error::ToolResult;

/// A Workflowy API request built from tool input.
struct ProxyRequest {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
}

/// Static description of one proxy tool.
struct ProxySpec {
    name: &'static str,
    description: &'static str,
    schema: fn() -> serde_json::Value,
    build: fn(&serde_json::Value) -> ToolResult<ProxyRequest>,
}

/// A tool backed by a [`ProxySpec`] table entry.
pub struct NodeProxyTool {
    spec: &'static ProxySpec,
}

#[async_trait::async_trait]
impl McpTool for NodeProxyTool {
    fn name(&self) -> &'static str {
        self.spec.name
    }

    fn description(&self) -> &'static str {
        self.spec.description
    }

    fn input_schema(&self) -> serde_json::Value {
        (self.spec.schema)()
    }

    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult<String> {
        let request = (self.spec.build)(&input)?;
        let envelope = ctx
            .client
            .request(&ctx.api_key, request.method, &request.path, request.body)
            .await?;
        Ok(serde_json::to_string_pretty(&envelope)?)
    }
}

/// Build all node proxy tools.
pub fn node_tools() -> Vec<Box<dyn McpTool>> {
    SPECS.iter().map(|spec| Box::new(NodeProxyTool { spec }) as Box<dyn McpTool>).collect()
}

fn node_id_schema(description: &str) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "node_id": {
                "type": "string",
                "description": description
            }
        },
        "required": ["node_id"]
    })
}

fn empty_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {}
    })
}

fn encode_query(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

static SPECS: &[ProxySpec] = &[
    ProxySpec {
        name: "list_nodes",
        description: "List child nodes under a parent. Always use the specified parent_id if \
                      you know it. Otherwise, use parent_id='None' for top-level nodes, or use \
                      'inbox'/'home' for those two special locations.",
        schema: || {
            json!({
                "type": "object",
                "properties": {
                    "parent_id": {
                        "type": "string",
                        "description": "Parent node ID: 'None' for top-level, 'inbox', 'home', or a node UUID"
                    }
                },
                "required": ["parent_id"]
            })
        },
        build: |input| {
            let parent_id = required_str(input, "parent_id")?;
            Ok(ProxyRequest {
                method: Method::GET,
                path: format!("/api/v1/nodes?parent_id={}", encode_query(parent_id)),
                body: None,
            })
        },
    },
    ProxySpec {
        name: "get_node",
        description: "Get a single node by its ID. Returns the node's name, note, and metadata.",
        schema: || node_id_schema("The node UUID to retrieve"),
        build: |input| {
            let node_id = required_str(input, "node_id")?;
            Ok(ProxyRequest {
                method: Method::GET,
                path: format!("/api/v1/nodes/{node_id}"),
                body: None,
            })
        },
    },
    ProxySpec {
        name: "export_all_nodes",
        description: "Export all nodes from the entire Workflowy account. WARNING: Rate \
                      limited to 1 request per minute. Use sparingly.",
        schema: empty_schema,
        build: |_input| {
            Ok(ProxyRequest {
                method: Method::GET,
                path: "/api/v1/nodes-export".to_string(),
                body: None,
            })
        },
    },
    ProxySpec {
        name: "get_targets",
        description: "Get special Workflowy targets like 'inbox' and 'home'. Useful for \
                      discovering available special locations.",
        schema: empty_schema,
        build: |_input| {
            Ok(ProxyRequest {
                method: Method::GET,
                path: "/api/v1/targets".to_string(),
                body: None,
            })
        },
    },
    ProxySpec {
        name: "create_node",
        description: "Create a new node (bullet point) in Workflowy. The node will be added as \
                      a child of the specified parent.",
        schema: || {
            json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "The text content of the node"
                    },
                    "parent_id": {
                        "type": "string",
                        "description": "Where to create the node: 'inbox', 'home', 'None' for top-level, or a node UUID"
                    },
                    "note": {
                        "type": "string",
                        "description": "Optional note/description for the node"
                    }
                },
                "required": ["name", "parent_id"]
            })
        },
        build: |input| {
            let name = required_str(input, "name")?;
            let parent_id = required_str(input, "parent_id")?;

            let mut body = json!({ "name": name, "parent_id": parent_id });
            if let Some(note) = input.get("note").and_then(|v| v.as_str()) {
                body["note"] = json!(note);
            }
            Ok(ProxyRequest {
                method: Method::POST,
                path: "/api/v1/nodes".to_string(),
                body: Some(body),
            })
        },
    },
    ProxySpec {
        name: "update_node",
        description: "Update an existing node's name or note.",
        schema: || {
            json!({
                "type": "object",
                "properties": {
                    "node_id": {
                        "type": "string",
                        "description": "The node UUID to update"
                    },
                    "name": {
                        "type": "string",
                        "description": "New name/text for the node"
                    },
                    "note": {
                        "type": "string",
                        "description": "New note for the node"
                    }
                },
                "required": ["node_id"]
            })
        },
        build: |input| {
            let node_id = required_str(input, "node_id")?;

            let mut body = json!({});
            if let Some(name) = input.get("name").and_then(|v| v.as_str()) {
                body["name"] = json!(name);
            }
            if let Some(note) = input.get("note").and_then(|v| v.as_str()) {
                body["note"] = json!(note);
            }
            Ok(ProxyRequest {
                method: Method::POST,
                path: format!("/api/v1/nodes/{node_id}"),
                body: Some(body),
            })
        },
    },
    ProxySpec {
        name: "delete_node",
        description: "Permanently delete a node and all its children. Use with caution.",
        schema: || node_id_schema("The node UUID to delete"),
        build: |input| {
            let node_id = required_str(input, "node_id")?;
            Ok(ProxyRequest {
                method: Method::DELETE,
                path: format!("/api/v1/nodes/{node_id}"),
                body: None,
            })
        },
    },
    ProxySpec {
        name: "move_node",
        description: "Move a node to a different parent location.",
        schema: || {
            json!({
                "type": "object",
                "properties": {
                    "node_id": {
                        "type": "string",
                        "description": "The node UUID to move"
                    },
                    "parent_id": {
                        "type": "string",
                        "description": "New parent: 'inbox', 'home', 'None' for top-level, or a node UUID"
                    }
                },
                "required": ["node_id", "parent_id"]
            })
        },
        build: |input| {
            let node_id = required_str(input, "node_id")?;
            let parent_id = required_str(input, "parent_id")?;
            Ok(ProxyRequest {
                method: Method::POST,
                path: format!("/api/v1/nodes/{node_id}/move"),
                body: Some(json!({ "parent_id": parent_id })),
            })
        },
    },
    ProxySpec {
        name: "complete_node",
        description: "Mark a node as completed (checked off).",
        schema: || node_id_schema("The node UUID to mark as complete"),
        build: |input| {
            let node_id = required_str(input, "node_id")?;
            Ok(ProxyRequest {
                method: Method::POST,
                path: format!("/api/v1/nodes/{node_id}/complete"),
                body: None,
            })
        },
    },
    ProxySpec {
        name: "uncomplete_node",
        description: "Mark a node as not completed (unchecked).",
        schema: || node_id_schema("The node UUID to mark as incomplete"),
        build: |input| {
            let node_id = required_str(input, "node_id")?;
            Ok(ProxyRequest {
                method: Method::POST,
                path: format!("/api/v1/nodes/{node_id}/uncomplete"),
                body: None,
            })
        },
    },
];
