//! HTTP transport for the MCP server.
//!
//! A single JSON-RPC endpoint at `/mcp`, gated by the OAuth bearer tokens
//! this server itself issues. Tool execution receives the caller's Workflowy
//! API key through a per-request context; nothing about the current user is
//! stored in shared state.

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::client::WorkflowyClient;
use crate::config::Config;
use crate::oauth::{AccessTokenCodec, ClientRegistry, CredentialCipher, GrantStore, handlers};
use crate::tools::{BookmarkStore, McpTool, ToolContext, register_all_tools};

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcResponse {
    /// JSON-RPC version constant.
    const VERSION: &'static str = "2.0";

    #[must_use]
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self { jsonrpc: Cow::Borrowed(Self::VERSION), result: Some(result), error: None, id }
    }

    #[must_use]
    pub fn error(id: Option<serde_json::Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(Self::VERSION),
            result: None,
            error: Some(JsonRpcError { code, message: message.into(), data: None }),
            id,
        }
    }
}

/// MCP tool info for tools/list response.
#[derive(Debug, Serialize)]
pub struct McpToolInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Shared state for HTTP handlers.
pub struct HttpState {
    pub tools: Vec<Box<dyn McpTool>>,
    pub workflowy: Arc<WorkflowyClient>,
    pub bookmarks: BookmarkStore,
    pub registry: ClientRegistry,
    pub grants: GrantStore,
    pub cipher: CredentialCipher,
    pub codec: AccessTokenCodec,
    /// Issuer URL for metadata and endpoint announcements.
    pub issuer: String,
    /// Shared secret gating `/register`, if configured.
    pub registration_secret: Option<String>,
}

/// Create the HTTP router.
///
/// # Errors
///
/// Returns error when key material is missing or malformed, or when the HTTP
/// client cannot be built.
pub fn create_router(config: &Config) -> anyhow::Result<Router> {
    let cipher = CredentialCipher::new(config.encryption_key.as_deref())?;
    let codec =
        AccessTokenCodec::new(config.jwt_secret.as_deref(), &config.issuer, cipher.clone())?;
    let workflowy = Arc::new(WorkflowyClient::new(config)?);

    let grants = GrantStore::new();
    grants.clone().start_sweep_task();

    let state = Arc::new(HttpState {
        tools: register_all_tools(),
        workflowy,
        bookmarks: BookmarkStore::new(),
        registry: ClientRegistry::new(),
        grants,
        cipher,
        codec,
        issuer: config.issuer.clone(),
        registration_secret: config.registration_secret.clone(),
    });

    Ok(Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        // OAuth discovery
        .route(
            "/.well-known/oauth-authorization-server",
            get(handlers::handle_auth_server_metadata),
        )
        .route("/.well-known/oauth-protected-resource", get(handlers::handle_protected_resource))
        // OAuth flow
        .route(
            "/authorize",
            get(handlers::handle_authorize_get).post(handlers::handle_authorize_post),
        )
        .route("/token", post(handlers::handle_token))
        .route("/register", post(handlers::handle_register))
        // MCP endpoint
        .route("/mcp", post(handle_mcp_post).get(handle_mcp_get))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "workflowy-mcp",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// `GET /mcp` returns server info for probes that do not speak JSON-RPC.
async fn handle_mcp_get() -> impl IntoResponse {
    Json(serde_json::json!({
        "jsonrpc": "2.0",
        "result": {
            "name": "workflowy-mcp",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "MCP server for Workflowy. Send POST requests with Bearer token authentication."
        },
        "id": null
    }))
}

/// `POST /mcp`
///
/// Requires a bearer token issued by this server's token endpoint. A missing
/// or invalid token gets a 401 pointing at the protected-resource metadata.
async fn handle_mcp_post(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Json(req): Json<JsonRpcRequest>,
) -> Response {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let verified = token.and_then(|t| state.codec.verify(t));
    let Some(verified) = verified else {
        return unauthorized(&state.issuer);
    };

    tracing::debug!(method = %req.method, client_id = %verified.client_id, "Handling MCP request");

    let is_notification = req.id.is_none();

    let response = match req.method.as_str() {
        "initialize" => JsonRpcResponse::success(req.id, handle_initialize(&req.params)),
        "notifications/initialized" | "initialized" | "notifications/cancelled" => {
            if is_notification {
                return StatusCode::ACCEPTED.into_response();
            }
            JsonRpcResponse::success(req.id, serde_json::json!({}))
        }
        "tools/list" => handle_tools_list(req.id, &state.tools),
        "tools/call" => {
            let ctx = ToolContext {
                api_key: verified.api_key,
                client: Arc::clone(&state.workflowy),
                bookmarks: state.bookmarks.clone(),
            };
            handle_tools_call(req.id, &req.params, &state.tools, &ctx).await
        }
        "ping" => JsonRpcResponse::success(req.id, serde_json::json!({})),
        _ => {
            if is_notification {
                return StatusCode::ACCEPTED.into_response();
            }
            JsonRpcResponse::error(req.id, -32601, format!("Method not found: {}", req.method))
        }
    };

    Json(response).into_response()
}

fn unauthorized(issuer: &str) -> Response {
    let metadata_url = format!("{issuer}/.well-known/oauth-protected-resource");
    (
        StatusCode::UNAUTHORIZED,
        [(
            header::WWW_AUTHENTICATE,
            format!("Bearer resource_metadata=\"{metadata_url}\""),
        )],
        Json(JsonRpcResponse::error(
            None,
            -32001,
            "Authorization required. Provide Bearer token in Authorization header.",
        )),
    )
        .into_response()
}

fn handle_initialize(params: &serde_json::Value) -> serde_json::Value {
    let protocol_version =
        params.get("protocolVersion").and_then(|v| v.as_str()).unwrap_or("2024-11-05");

    tracing::info!("MCP initialize: protocol version {}", protocol_version);

    serde_json::json!({
        "protocolVersion": protocol_version,
        "capabilities": {
            "tools": {
                "listChanged": false
            }
        },
        "serverInfo": {
            "name": "workflowy-mcp",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn handle_tools_list(id: Option<serde_json::Value>, tools: &[Box<dyn McpTool>]) -> JsonRpcResponse {
    let tool_list: Vec<McpToolInfo> = tools
        .iter()
        .map(|t| McpToolInfo {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.input_schema(),
        })
        .collect();

    JsonRpcResponse::success(
        id,
        serde_json::json!({
            "tools": tool_list
        }),
    )
}

async fn handle_tools_call(
    id: Option<serde_json::Value>,
    params: &serde_json::Value,
    tools: &[Box<dyn McpTool>],
    ctx: &ToolContext,
) -> JsonRpcResponse {
    let Some(tool_name) = params.get("name").and_then(|v| v.as_str()) else {
        return JsonRpcResponse::error(id, -32602, "Missing 'name' parameter");
    };

    let arguments = params.get("arguments").cloned().unwrap_or(serde_json::json!({}));

    let Some(tool) = tools.iter().find(|t| t.name() == tool_name) else {
        return JsonRpcResponse::error(id, -32602, format!("Tool not found: {tool_name}"));
    };

    tracing::info!(tool = %tool_name, "Executing tool");

    match tool.execute(ctx, arguments).await {
        Ok(result) => JsonRpcResponse::success(
            id,
            serde_json::json!({
                "content": [{
                    "type": "text",
                    "text": result
                }]
            }),
        ),
        Err(e) => {
            tracing::error!(tool = %tool_name, error = %e, "Tool execution failed");
            JsonRpcResponse::error(id, -32000, format!("Tool error: {e}"))
        }
    }
}
