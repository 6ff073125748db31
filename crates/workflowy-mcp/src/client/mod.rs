//! Workflowy API client.
//!
//! Provides an async HTTP client with:
//! - Connection pooling via reqwest
//! - Retry middleware with exponential backoff
//!
//! Every call is made on behalf of a specific user, so the API key is an
//! argument to each request rather than client state.

use std::time::Duration;

use reqwest::{Client, Method};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::Serialize;

use crate::config::Config;
use crate::error::ClientResult;

/// Outcome of a Workflowy API call, success or failure alike.
///
/// Upstream errors are data, not transport failures: a 401 or 404 from
/// Workflowy is reported here with `ok: false` so tools can surface it to the
/// caller verbatim. Only transport problems become `ClientError`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiEnvelope {
    /// HTTP status returned by Workflowy.
    pub http_status: u16,
    /// Whether the status was in the success range.
    pub ok: bool,
    /// Parsed response body, or `{"raw": <text>}` when it was not JSON.
    pub data: serde_json::Value,
}

/// Workflowy API client.
#[derive(Clone)]
pub struct WorkflowyClient {
    /// HTTP client with middleware.
    client: ClientWithMiddleware,

    /// API base URL.
    base_url: String,
}

impl WorkflowyClient {
    /// Create a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .build()?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_secs(1), Duration::from_secs(10))
            .build_with_max_retries(2);

        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client, base_url: config.workflowy_api_url.clone() })
    }

    /// Check whether an API key can read the account's targets.
    ///
    /// Returns `Ok(false)` when Workflowy answers with any non-success
    /// status; a transport failure is an `Err`, since it says nothing about
    /// the key.
    pub async fn validate_api_key(&self, api_key: &str) -> ClientResult<bool> {
        let envelope = self.request(api_key, Method::GET, "/api/v1/targets", None).await?;
        Ok(envelope.ok)
    }

    /// Make an authenticated request against the Workflowy API.
    ///
    /// `path` must start with `/`. A JSON body is sent when provided.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure only; HTTP-level errors come back
    /// inside the envelope.
    pub async fn request(
        &self,
        api_key: &str,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ClientResult<ApiEnvelope> {
        let url = format!("{}{}", self.base_url, path);

        let mut builder = self.client.request(method, url).bearer_auth(api_key);
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await?;
        let status = response.status();

        let text = response.text().await?;
        let data = if text.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text)
                .unwrap_or_else(|_| serde_json::json!({ "raw": text }))
        };

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), path = %path, "Workflowy API error response");
        }

        Ok(ApiEnvelope { http_status: status.as_u16(), ok: status.is_success(), data })
    }
}

impl std::fmt::Debug for WorkflowyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowyClient").field("base_url", &self.base_url).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_client(server: &MockServer) -> WorkflowyClient {
        let config = Config::for_testing(&server.uri());
        WorkflowyClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_validate_api_key_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/targets"))
            .and(header("authorization", "Bearer good-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "targets": []
            })))
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        assert!(client.validate_api_key("good-key").await.unwrap());
    }

    #[tokio::test]
    async fn test_validate_api_key_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/targets"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        assert!(!client.validate_api_key("bad-key").await.unwrap());
    }

    #[tokio::test]
    async fn test_request_envelope_carries_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/nodes/xyz"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": "not found"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let envelope =
            client.request("key", Method::GET, "/api/v1/nodes/xyz", None).await.unwrap();
        assert_eq!(envelope.http_status, 404);
        assert!(!envelope.ok);
        assert_eq!(envelope.data["error"], "not found");
    }

    #[tokio::test]
    async fn test_request_non_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/nodes"))
            .respond_with(ResponseTemplate::new(200).set_body_string("plain text"))
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let envelope = client.request("key", Method::GET, "/api/v1/nodes", None).await.unwrap();
        assert!(envelope.ok);
        assert_eq!(envelope.data["raw"], "plain text");
    }
}
