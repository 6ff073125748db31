//! Full-flow tests for the OAuth 2.0 authorization code grant, driven against
//! a mock Workflowy upstream: registration, consent, code exchange, the MCP
//! endpoint, and refresh rotation.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD as BASE64_STANDARD, URL_SAFE_NO_PAD};
use serde_json::json;
use sha2::{Digest, Sha256};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use workflowy_mcp::config::Config;
use workflowy_mcp::oauth::{AccessTokenCodec, CredentialCipher};
use workflowy_mcp::server::transport::create_router;

const REDIRECT_URI: &str = "https://app.example/cb";
const CODE_VERIFIER: &str = "test-code-verifier-with-plenty-of-entropy-0123456789";
const API_KEY: &str = "wf-key-12345";

fn code_challenge() -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(CODE_VERIFIER.as_bytes()))
}

async fn mock_workflowy() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/targets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "targets": [{"id": "inbox"}, {"id": "home"}]
        })))
        .mount(&server)
        .await;
    server
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn register_client(app: &axum::Router) -> (String, String) {
    let response = app
        .clone()
        .oneshot(
            Request::post("/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "client_name": "Flow Test",
                        "redirect_uris": [REDIRECT_URI],
                        "grant_types": ["authorization_code", "refresh_token"]
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    (
        json["client_id"].as_str().unwrap().to_string(),
        json["client_secret"].as_str().unwrap().to_string(),
    )
}

/// Drive GET + POST /authorize and return the issued code and echoed state.
async fn approve_authorization(app: &axum::Router, client_id: &str) -> (String, String) {
    let challenge = code_challenge();
    let uri = format!(
        "/authorize?client_id={client_id}&redirect_uri=https%3A%2F%2Fapp.example%2Fcb\
         &response_type=code&code_challenge={challenge}&code_challenge_method=S256&state=st-42"
    );
    let response =
        app.clone().oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let form = serde_urlencoded::to_string([
        ("client_id", client_id),
        ("redirect_uri", REDIRECT_URI),
        ("state", "st-42"),
        ("code_challenge", &challenge),
        ("code_challenge_method", "S256"),
        ("scope", "workflowy"),
        ("workflowy_api_key", API_KEY),
    ])
    .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::post("/authorize")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
    assert!(location.starts_with(REDIRECT_URI));

    let query = location.split_once('?').unwrap().1;
    let params: Vec<(String, String)> = serde_urlencoded::from_str(query).unwrap();
    let code = params.iter().find(|(k, _)| k == "code").unwrap().1.clone();
    let state = params.iter().find(|(k, _)| k == "state").unwrap().1.clone();
    (code, state)
}

fn basic_auth(client_id: &str, client_secret: &str) -> String {
    format!("Basic {}", BASE64_STANDARD.encode(format!("{client_id}:{client_secret}")))
}

async fn exchange_code(
    app: &axum::Router,
    client_id: &str,
    client_secret: &str,
    code: &str,
) -> axum::response::Response {
    let form = serde_urlencoded::to_string([
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", REDIRECT_URI),
        ("code_verifier", CODE_VERIFIER),
    ])
    .unwrap();

    app.clone()
        .oneshot(
            Request::post("/token")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .header(header::AUTHORIZATION, basic_auth(client_id, client_secret))
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_full_authorization_flow() {
    let upstream = mock_workflowy().await;
    let config = Config::for_testing(&upstream.uri());
    let app = create_router(&config).unwrap();

    let (client_id, client_secret) = register_client(&app).await;
    let (code, state) = approve_authorization(&app, &client_id).await;
    assert_eq!(state, "st-42");

    let response = exchange_code(&app, &client_id, &client_secret, &code).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap().to_str().unwrap(),
        "no-store"
    );
    let tokens = body_json(response).await;

    assert_eq!(tokens["token_type"], "Bearer");
    assert_eq!(tokens["expires_in"], 3600);
    assert_eq!(tokens["scope"], "workflowy");
    assert!(!tokens["refresh_token"].as_str().unwrap().is_empty());

    // The access token is a self-contained JWT carrying the encrypted key
    let cipher = CredentialCipher::new(config.encryption_key.as_deref()).unwrap();
    let codec =
        AccessTokenCodec::new(config.jwt_secret.as_deref(), &config.issuer, cipher).unwrap();
    let verified = codec.verify(tokens["access_token"].as_str().unwrap()).unwrap();
    assert_eq!(verified.api_key, API_KEY);
    assert_eq!(verified.client_id, client_id);
}

#[tokio::test]
async fn test_access_token_unlocks_mcp_endpoint() {
    let upstream = mock_workflowy().await;
    let config = Config::for_testing(&upstream.uri());
    let app = create_router(&config).unwrap();

    let (client_id, client_secret) = register_client(&app).await;
    let (code, _) = approve_authorization(&app, &client_id).await;
    let tokens = body_json(exchange_code(&app, &client_id, &client_secret, &code).await).await;
    let access_token = tokens["access_token"].as_str().unwrap();

    let response = app
        .oneshot(
            Request::post("/mcp")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
                .body(Body::from(
                    json!({
                        "jsonrpc": "2.0",
                        "method": "tools/call",
                        "params": {"name": "get_targets", "arguments": {}},
                        "id": 1
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let text = json["result"]["content"][0]["text"].as_str().unwrap();
    let envelope: serde_json::Value = serde_json::from_str(text).unwrap();
    assert_eq!(envelope["http_status"], 200);
    assert_eq!(envelope["ok"], true);
    assert_eq!(envelope["data"]["targets"][0]["id"], "inbox");
}

#[tokio::test]
async fn test_authorization_code_is_single_use() {
    let upstream = mock_workflowy().await;
    let config = Config::for_testing(&upstream.uri());
    let app = create_router(&config).unwrap();

    let (client_id, client_secret) = register_client(&app).await;
    let (code, _) = approve_authorization(&app, &client_id).await;

    let response = exchange_code(&app, &client_id, &client_secret, &code).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Replaying the same code must fail
    let response = exchange_code(&app, &client_id, &client_secret, &code).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_grant");
}

#[tokio::test]
async fn test_wrong_code_verifier_rejected() {
    let upstream = mock_workflowy().await;
    let config = Config::for_testing(&upstream.uri());
    let app = create_router(&config).unwrap();

    let (client_id, client_secret) = register_client(&app).await;
    let (code, _) = approve_authorization(&app, &client_id).await;

    let form = serde_urlencoded::to_string([
        ("grant_type", "authorization_code"),
        ("code", code.as_str()),
        ("redirect_uri", REDIRECT_URI),
        ("code_verifier", "completely-wrong-verifier"),
    ])
    .unwrap();

    let response = app
        .oneshot(
            Request::post("/token")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .header(header::AUTHORIZATION, basic_auth(&client_id, &client_secret))
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_grant");
}

#[tokio::test]
async fn test_refresh_token_rotation() {
    let upstream = mock_workflowy().await;
    let config = Config::for_testing(&upstream.uri());
    let app = create_router(&config).unwrap();

    let (client_id, client_secret) = register_client(&app).await;
    let (code, _) = approve_authorization(&app, &client_id).await;
    let tokens = body_json(exchange_code(&app, &client_id, &client_secret, &code).await).await;
    let refresh_token = tokens["refresh_token"].as_str().unwrap().to_string();

    let refresh = |token: String| {
        let app = app.clone();
        let auth = basic_auth(&client_id, &client_secret);
        async move {
            let form = serde_urlencoded::to_string([
                ("grant_type", "refresh_token"),
                ("refresh_token", token.as_str()),
            ])
            .unwrap();
            app.oneshot(
                Request::post("/token")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .header(header::AUTHORIZATION, auth)
                    .body(Body::from(form))
                    .unwrap(),
            )
            .await
            .unwrap()
        }
    };

    // First refresh succeeds and hands out a different refresh token
    let response = refresh(refresh_token.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let new_tokens = body_json(response).await;
    let new_refresh = new_tokens["refresh_token"].as_str().unwrap();
    assert_ne!(new_refresh, refresh_token);

    // The new access token still carries the credential
    let cipher = CredentialCipher::new(config.encryption_key.as_deref()).unwrap();
    let codec =
        AccessTokenCodec::new(config.jwt_secret.as_deref(), &config.issuer, cipher).unwrap();
    let verified = codec.verify(new_tokens["access_token"].as_str().unwrap()).unwrap();
    assert_eq!(verified.api_key, API_KEY);

    // The rotated-out token is dead
    let response = refresh(refresh_token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_grant");
}

#[tokio::test]
async fn test_invalid_api_key_rerenders_consent() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/targets"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "unauthorized"})))
        .mount(&upstream)
        .await;

    let config = Config::for_testing(&upstream.uri());
    let app = create_router(&config).unwrap();

    let (client_id, _) = register_client(&app).await;

    let challenge = code_challenge();
    let form = serde_urlencoded::to_string([
        ("client_id", client_id.as_str()),
        ("redirect_uri", REDIRECT_URI),
        ("state", "st-42"),
        ("code_challenge", challenge.as_str()),
        ("code_challenge_method", "S256"),
        ("scope", "workflowy"),
        ("workflowy_api_key", "bad-key"),
    ])
    .unwrap();

    let response = app
        .oneshot(
            Request::post("/authorize")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();

    // No redirect, no code: the form comes back with an inline error and the
    // flow parameters preserved
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("Invalid Workflowy API key"));
    assert!(html.contains(r#"value="st-42""#));
    assert!(html.contains(&challenge));
}
