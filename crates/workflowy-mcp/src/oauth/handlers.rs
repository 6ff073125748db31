//! OAuth 2.0 endpoint handlers.
//!
//! Implements:
//! - RFC 9728: OAuth Protected Resource Metadata
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7636: PKCE (S256)
//! - RFC 6749: OAuth 2.0 Authorization Code Grant

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::Deserialize;

use super::consent::render_consent_page;
use super::crypto::constant_time_str_eq;
use super::pkce;
use crate::config::api;
use crate::error::RegistrationError;
use crate::server::transport::HttpState;

// ─── RFC 9728: Protected Resource Metadata ───────────────────────────────────

/// `GET /.well-known/oauth-protected-resource`
///
/// Tells clients where to find the authorization server for this resource.
pub async fn handle_protected_resource(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "resource": state.issuer,
        "authorization_servers": [state.issuer],
        "bearer_methods_supported": ["header"],
        "scopes_supported": [api::SCOPE]
    }))
}

// ─── RFC 8414: Authorization Server Metadata ─────────────────────────────────

/// `GET /.well-known/oauth-authorization-server`
///
/// Describes the OAuth endpoints and capabilities.
pub async fn handle_auth_server_metadata(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "issuer": state.issuer,
        "authorization_endpoint": format!("{}/authorize", state.issuer),
        "token_endpoint": format!("{}/token", state.issuer),
        "registration_endpoint": format!("{}/register", state.issuer),
        "scopes_supported": [api::SCOPE],
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "token_endpoint_auth_methods_supported": ["client_secret_basic", "client_secret_post"],
        "code_challenge_methods_supported": ["S256"]
    }))
}

// ─── RFC 7591: Dynamic Client Registration ───────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub client_name: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: Option<String>,
}

/// `POST /register`
///
/// Register a new OAuth client dynamically. When a registration secret is
/// configured, the `x-oauth-registration-secret` header must match it.
pub async fn handle_register(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Response {
    if let Some(ref expected) = state.registration_secret {
        let presented = headers
            .get("x-oauth-registration-secret")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !constant_time_str_eq(presented, expected) {
            return (
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({
                    "error": "invalid_client_metadata",
                    "error_description": "Registration is restricted"
                })),
            )
                .into_response();
        }
    }

    let redirect_uris = req.redirect_uris.unwrap_or_default();
    if redirect_uris.is_empty() {
        return registration_error("invalid_client_metadata", "redirect_uris is required");
    }

    let issued = match state.registry.register(req.client_name, redirect_uris, req.grant_types).await
    {
        Ok(issued) => issued,
        Err(RegistrationError::InvalidRedirectUri(uri)) => {
            return registration_error(
                "invalid_redirect_uri",
                &format!("Redirect URI not acceptable: {uri}"),
            );
        }
        Err(RegistrationError::UnsupportedGrantType(grant)) => {
            return registration_error(
                "invalid_client_metadata",
                &format!("Unsupported grant type: {grant}"),
            );
        }
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "client_id": issued.client_id,
            "client_secret": issued.client_secret,
            "client_id_issued_at": chrono::Utc::now().timestamp(),
            "client_secret_expires_at": 0,
            "client_name": issued.client_name,
            "redirect_uris": issued.redirect_uris,
            "grant_types": issued.grant_types,
            "response_types": ["code"],
            "token_endpoint_auth_method": "client_secret_basic"
        })),
    )
        .into_response()
}

fn registration_error(error: &str, description: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "error": error,
            "error_description": description
        })),
    )
        .into_response()
}

// ─── Authorization Endpoint ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub response_type: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub scope: Option<String>,
}

/// `GET /authorize`
///
/// Validate the authorization request and render the consent page. Every
/// parameter is checked before the user is asked for anything: a request with
/// a bad client or an unregistered redirect URI never reaches the form.
pub async fn handle_authorize_get(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<AuthorizeQuery>,
) -> Response {
    let Some(client_id) = query.client_id.as_deref() else {
        return authorize_error("invalid_request", "Missing client_id");
    };
    let Some(redirect_uri) = query.redirect_uri.as_deref() else {
        return authorize_error("invalid_request", "Missing redirect_uri");
    };
    if query.response_type.as_deref() != Some("code") {
        return authorize_error("unsupported_response_type", "response_type must be 'code'");
    }
    let Some(code_challenge) = query.code_challenge.as_deref() else {
        return authorize_error("invalid_request", "Missing code_challenge");
    };
    if query.code_challenge_method.as_deref() != Some("S256") {
        return authorize_error("invalid_request", "code_challenge_method must be 'S256'");
    }

    let Some(client) = state.registry.get(client_id).await else {
        return authorize_error("invalid_client", "Unknown client_id");
    };
    if !client.has_redirect_uri(redirect_uri) {
        return authorize_error("invalid_request", "redirect_uri not registered for this client");
    }

    let scope = query.scope.as_deref().unwrap_or(api::SCOPE);
    let client_name = client.client_name.as_deref().unwrap_or(client_id);

    Html(render_consent_page(
        client_name,
        client_id,
        redirect_uri,
        query.state.as_deref().unwrap_or_default(),
        code_challenge,
        "S256",
        scope,
        None,
    ))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct ConsentForm {
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub state: String,
    pub code_challenge: String,
    #[serde(default)]
    pub code_challenge_method: String,
    #[serde(default)]
    pub scope: String,
    pub workflowy_api_key: String,
}

/// `POST /authorize`
///
/// Handle the submitted consent form. The API key is validated against the
/// live Workflowy API before any code is issued; a key that fails validation
/// re-renders the form with an inline error and all flow parameters intact.
pub async fn handle_authorize_post(
    State(state): State<Arc<HttpState>>,
    axum::Form(form): axum::Form<ConsentForm>,
) -> Response {
    // The hidden fields are attacker-controlled; check them again
    let Some(client) = state.registry.get(&form.client_id).await else {
        return authorize_error("invalid_client", "Unknown client_id");
    };
    if !client.has_redirect_uri(&form.redirect_uri) {
        return authorize_error("invalid_request", "redirect_uri not registered for this client");
    }

    let api_key = form.workflowy_api_key.trim();
    if api_key.is_empty() {
        return consent_retry(&client, &form, "Workflowy API key is required");
    }

    match state.workflowy.validate_api_key(api_key).await {
        Ok(true) => {}
        Ok(false) => {
            return consent_retry(
                &client,
                &form,
                "Invalid Workflowy API key. Check the key and try again.",
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "Workflowy key validation failed upstream");
            return consent_retry(
                &client,
                &form,
                "Could not reach Workflowy to verify the key. Try again.",
            );
        }
    }

    let encrypted = match state.cipher.encrypt(api_key) {
        Ok(blob) => blob,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encrypt credential");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response();
        }
    };

    let scope = if form.scope.is_empty() { api::SCOPE } else { &form.scope };
    let code = state
        .grants
        .create_auth_code(
            form.client_id.clone(),
            form.redirect_uri.clone(),
            form.code_challenge.clone(),
            scope.to_string(),
            encrypted,
        )
        .await;

    tracing::info!(client_id = %form.client_id, "Approved authorization request");

    let mut redirect_url = form.redirect_uri.clone();
    redirect_url.push_str(if redirect_url.contains('?') { "&" } else { "?" });
    redirect_url.push_str(&format!("code={code}"));
    if !form.state.is_empty() {
        redirect_url.push_str(&format!("&state={}", url_encode(&form.state)));
    }

    // 302, not 307: the client must follow with GET, never re-POST the form
    (StatusCode::FOUND, [(header::LOCATION, redirect_url)]).into_response()
}

fn consent_retry(
    client: &super::registry::RegisteredClient,
    form: &ConsentForm,
    message: &str,
) -> Response {
    let client_name = client.client_name.as_deref().unwrap_or(&form.client_id);
    let scope = if form.scope.is_empty() { api::SCOPE } else { &form.scope };
    (
        StatusCode::BAD_REQUEST,
        Html(render_consent_page(
            client_name,
            &form.client_id,
            &form.redirect_uri,
            &form.state,
            &form.code_challenge,
            "S256",
            scope,
            Some(message),
        )),
    )
        .into_response()
}

fn authorize_error(error: &str, description: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "error": error,
            "error_description": description
        })),
    )
        .into_response()
}

// ─── Token Endpoint ──────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
}

/// `POST /token`
///
/// Exchange an authorization code for tokens, or rotate a refresh token.
/// Accepts a form-encoded or JSON body; client credentials come from a Basic
/// `Authorization` header or the body, header preferred.
pub async fn handle_token(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let content_type =
        headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or_default();
    let parsed: Result<TokenRequest, String> = if content_type.starts_with("application/json") {
        serde_json::from_str(&body).map_err(|e| e.to_string())
    } else {
        serde_urlencoded::from_str(&body).map_err(|e| e.to_string())
    };
    let form = match parsed {
        Ok(form) => form,
        Err(e) => return token_error("invalid_request", &format!("Malformed request body: {e}")),
    };

    // Authenticate the client before touching any grant
    let Some((client_id, client_secret)) = client_credentials(&headers, &form) else {
        return token_error("invalid_client", "Missing client credentials");
    };
    if !state.registry.verify_credentials(&client_id, &client_secret).await {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "invalid_client",
                "error_description": "Client authentication failed"
            })),
        )
            .into_response();
    }

    match form.grant_type.as_str() {
        "authorization_code" => handle_authorization_code_grant(&state, &client_id, &form).await,
        "refresh_token" => handle_refresh_token_grant(&state, &client_id, &form).await,
        _ => token_error("unsupported_grant_type", "Unsupported grant_type"),
    }
}

/// Extract client credentials, preferring the Basic `Authorization` header
/// over body parameters.
fn client_credentials(headers: &HeaderMap, form: &TokenRequest) -> Option<(String, String)> {
    if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(encoded) = value.strip_prefix("Basic ") {
            let decoded = BASE64_STANDARD.decode(encoded).ok()?;
            let decoded = String::from_utf8(decoded).ok()?;
            let (id, secret) = decoded.split_once(':')?;
            return Some((id.to_string(), secret.to_string()));
        }
    }
    match (&form.client_id, &form.client_secret) {
        (Some(id), Some(secret)) => Some((id.clone(), secret.clone())),
        _ => None,
    }
}

async fn handle_authorization_code_grant(
    state: &HttpState,
    client_id: &str,
    form: &TokenRequest,
) -> Response {
    let Some(ref code) = form.code else {
        return token_error("invalid_request", "Missing code");
    };
    let Some(ref redirect_uri) = form.redirect_uri else {
        return token_error("invalid_request", "Missing redirect_uri");
    };
    let Some(ref code_verifier) = form.code_verifier else {
        return token_error("invalid_request", "Missing code_verifier");
    };

    // One-time: the grant is gone from the store after this line, whatever
    // the remaining checks say. Failures are a uniform invalid_grant so the
    // response does not reveal which check failed.
    let Some(grant) = state.grants.consume_auth_code(code).await else {
        return token_error("invalid_grant", "Invalid or expired authorization code");
    };
    if grant.client_id != client_id {
        return token_error("invalid_grant", "Invalid or expired authorization code");
    }
    if grant.redirect_uri != *redirect_uri {
        return token_error("invalid_grant", "Invalid or expired authorization code");
    }
    if !pkce::verify_s256(code_verifier, &grant.code_challenge) {
        return token_error("invalid_grant", "Invalid or expired authorization code");
    }

    issue_token_pair(state, client_id, &grant.scope, &grant.encrypted_api_key).await
}

async fn handle_refresh_token_grant(
    state: &HttpState,
    client_id: &str,
    form: &TokenRequest,
) -> Response {
    let Some(ref refresh_token) = form.refresh_token else {
        return token_error("invalid_request", "Missing refresh_token");
    };

    let Some(grant) = state.grants.get_refresh_grant(refresh_token).await else {
        // Clears an expired row if one is still sitting in the table
        state.grants.delete_refresh_token(refresh_token).await;
        return token_error("invalid_grant", "Invalid or expired refresh token");
    };
    if grant.client_id != client_id {
        return token_error("invalid_grant", "Invalid or expired refresh token");
    }

    // Rotate: delete first. A failed delete means a concurrent request beat
    // us to this token, and only the winner may mint replacements.
    if !state.grants.delete_refresh_token(refresh_token).await {
        return token_error("invalid_grant", "Invalid or expired refresh token");
    }

    issue_token_pair(state, client_id, &grant.scope, &grant.encrypted_api_key).await
}

/// Mint an access token and a fresh refresh token over an encrypted
/// credential blob, and build the RFC 6749 §5.1 response.
async fn issue_token_pair(
    state: &HttpState,
    client_id: &str,
    scope: &str,
    encrypted_api_key: &str,
) -> Response {
    let api_key = match state.cipher.decrypt(encrypted_api_key) {
        Ok(key) => key,
        Err(e) => {
            tracing::error!(error = %e, "Failed to decrypt stored credential");
            return token_server_error();
        }
    };
    let access_token = match state.codec.issue(client_id, &api_key, api::ACCESS_TOKEN_TTL) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(error = %e, "Failed to sign access token");
            return token_server_error();
        }
    };
    let refresh_token = state
        .grants
        .create_refresh_token(
            client_id.to_string(),
            scope.to_string(),
            encrypted_api_key.to_string(),
        )
        .await;

    tracing::info!(client_id = %client_id, "Issued token pair");

    let mut response = Json(serde_json::json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": api::ACCESS_TOKEN_TTL.as_secs(),
        "refresh_token": refresh_token,
        "scope": scope
    }))
    .into_response();

    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

fn token_error(error: &str, description: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "error": error,
            "error_description": description
        })),
    )
        .into_response()
}

fn token_server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "error": "server_error",
            "error_description": "Token issuance failed"
        })),
    )
        .into_response()
}

/// Percent-encode a string for use in URL query parameters.
fn url_encode(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    encoded
}
