//! Configuration for the Workflowy MCP server.

use std::time::Duration;

/// API and protocol constants.
pub mod api {
    use std::time::Duration;

    /// Base URL for the Workflowy REST API.
    pub const WORKFLOWY_API_URL: &str = "https://workflowy.com";

    /// Default issuer when `OAUTH_ISSUER` is unset.
    pub const DEFAULT_ISSUER: &str = "http://localhost:8000";

    /// Request timeout for upstream calls.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// The single scope this server grants.
    pub const SCOPE: &str = "workflowy";

    /// Authorization code lifetime: 10 minutes.
    pub const AUTH_CODE_TTL: Duration = Duration::from_secs(600);

    /// Access token lifetime: 1 hour.
    pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(3600);

    /// Refresh token lifetime: 30 days.
    pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(30 * 24 * 3600);

    /// Interval between expired-grant sweeps.
    pub const SWEEP_INTERVAL: Duration = Duration::from_secs(300);
}

/// Server configuration.
///
/// Key material is loaded once at startup and treated as read-only; the
/// crypto types fail fast when a required key is absent.
#[derive(Debug, Clone)]
pub struct Config {
    /// AES-256-GCM key for encrypting stored Workflowy API keys (64-char hex).
    pub encryption_key: Option<String>,

    /// HMAC secret for signing access tokens.
    pub jwt_secret: Option<String>,

    /// Issuer URL advertised in metadata and embedded in token claims.
    pub issuer: String,

    /// Shared secret gating dynamic client registration.
    ///
    /// When unset, registration is open. That is an explicit operational
    /// choice, not a default the server silently falls into: `main` logs a
    /// warning at startup.
    pub registration_secret: Option<String>,

    /// Base URL for the Workflowy API (overridable for mock servers).
    pub workflowy_api_url: String,

    /// Request timeout for upstream calls.
    pub request_timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,
}

impl Config {
    /// Create a new configuration.
    #[must_use]
    pub fn new(encryption_key: Option<String>, jwt_secret: Option<String>) -> Self {
        Self {
            encryption_key,
            jwt_secret,
            issuer: api::DEFAULT_ISSUER.to_string(),
            registration_secret: None,
            workflowy_api_url: api::WORKFLOWY_API_URL.to_string(),
            request_timeout: api::REQUEST_TIMEOUT,
            connect_timeout: api::CONNECT_TIMEOUT,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if environment variables are invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::new(
            std::env::var("ENCRYPTION_KEY").ok(),
            std::env::var("JWT_SECRET").ok(),
        );
        if let Ok(issuer) = std::env::var("OAUTH_ISSUER") {
            config.issuer = issuer;
        }
        config.registration_secret = std::env::var("OAUTH_REGISTRATION_SECRET").ok();
        if let Ok(url) = std::env::var("WORKFLOWY_API_URL") {
            config.workflowy_api_url = url;
        }
        Ok(config)
    }

    /// Create a test configuration pointed at a mock upstream.
    #[must_use]
    pub fn for_testing(workflowy_api_url: &str) -> Self {
        Self {
            // Fixed 32-byte key, hex encoded
            encryption_key: Some("0".repeat(63) + "1"),
            jwt_secret: Some("test-jwt-secret".to_string()),
            issuer: "https://mcp.example".to_string(),
            registration_secret: None,
            workflowy_api_url: workflowy_api_url.to_string(),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        }
    }

    /// Check whether both signing and encryption keys are configured.
    #[must_use]
    pub const fn has_key_material(&self) -> bool {
        self.encryption_key.is_some() && self.jwt_secret.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(None, None)
    }
}
