//! Error types for the Workflowy MCP server.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.

/// Errors from the cryptographic layer.
///
/// Integrity failures (`AuthenticationFailed`) are expected outcomes of
/// processing attacker-controlled input and are reported without detail.
#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    /// No key material configured for this operation
    #[error("{0} is not configured")]
    MissingKey(&'static str),

    /// Key material present but not in the required format
    #[error("Invalid key format: {0}")]
    KeyFormat(String),

    /// Ciphertext blob does not have the expected structure
    #[error("Malformed ciphertext")]
    MalformedCiphertext,

    /// AES-GCM tag check failed (tampered data or wrong key)
    #[error("Ciphertext authentication failed")]
    AuthenticationFailed,
}

/// Errors from the Workflowy HTTP client layer.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Middleware error
    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// JSON parsing error
    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Unexpected HTTP status from the Workflowy API
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },
}

/// Errors from dynamic client registration.
#[derive(thiserror::Error, Debug)]
pub enum RegistrationError {
    /// A redirect URI failed validation
    #[error("Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),

    /// A requested grant type is outside the supported set
    #[error("Unsupported grant type: {0}")]
    UnsupportedGrantType(String),
}

/// Errors from MCP tool execution.
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    /// Error from the Workflowy API client
    #[error("API error: {0}")]
    Client(#[from] ClientError),

    /// Input validation failed
    #[error("Validation error: {message}")]
    Validation {
        /// Field that failed validation
        field: String,
        /// Validation error message
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type alias for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Result type alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;
