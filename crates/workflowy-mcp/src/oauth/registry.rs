//! Dynamic client registration (RFC 7591).
//!
//! Clients register at runtime and are held in memory. Client secrets are
//! stored as salted hashes only; the plaintext secret leaves this module
//! exactly once, in the registration response.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use url::Url;

use super::crypto::{generate_client_id, generate_secret, hash_secret, verify_secret};
use crate::error::RegistrationError;

/// Grant types this server supports.
const SUPPORTED_GRANT_TYPES: &[&str] = &["authorization_code", "refresh_token"];

/// A dynamically registered OAuth client.
#[derive(Debug, Clone)]
pub struct RegisteredClient {
    pub client_id: String,
    /// Salted hash of the client secret, `salt:hash` hex.
    pub secret_hash: String,
    pub client_name: Option<String>,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl RegisteredClient {
    /// Check whether a redirect URI exactly matches one registered for this
    /// client. Comparison is by string equality, no normalization.
    #[must_use]
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }
}

/// The outcome of a successful registration, including the one-time plaintext
/// secret.
#[derive(Debug)]
pub struct IssuedClient {
    pub client_id: String,
    pub client_secret: String,
    pub client_name: Option<String>,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
}

/// In-memory registry of OAuth clients.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<RwLock<HashMap<String, RegisteredClient>>>,
}

impl ClientRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client.
    ///
    /// Validates every redirect URI and every requested grant type before
    /// creating anything. An empty `grant_types` defaults to
    /// `authorization_code`.
    ///
    /// # Errors
    ///
    /// `RegistrationError::InvalidRedirectUri` for relative, non-http(s), or
    /// plain-http non-loopback URIs, `RegistrationError::UnsupportedGrantType`
    /// for grant types outside the supported set.
    pub async fn register(
        &self,
        client_name: Option<String>,
        redirect_uris: Vec<String>,
        grant_types: Vec<String>,
    ) -> Result<IssuedClient, RegistrationError> {
        for uri in &redirect_uris {
            validate_redirect_uri(uri)?;
        }

        let grant_types = if grant_types.is_empty() {
            vec!["authorization_code".to_string()]
        } else {
            grant_types
        };
        for grant in &grant_types {
            if !SUPPORTED_GRANT_TYPES.contains(&grant.as_str()) {
                return Err(RegistrationError::UnsupportedGrantType(grant.clone()));
            }
        }

        let client_id = generate_client_id();
        let client_secret = generate_secret();

        let client = RegisteredClient {
            client_id: client_id.clone(),
            secret_hash: hash_secret(&client_secret),
            client_name: client_name.clone(),
            redirect_uris: redirect_uris.clone(),
            grant_types: grant_types.clone(),
            created_at: Utc::now(),
        };
        self.clients.write().await.insert(client_id.clone(), client);

        tracing::info!(client_id = %client_id, name = ?client_name, "Registered OAuth client");

        Ok(IssuedClient { client_id, client_secret, client_name, redirect_uris, grant_types })
    }

    /// Look up a client by id.
    pub async fn get(&self, client_id: &str) -> Option<RegisteredClient> {
        self.clients.read().await.get(client_id).cloned()
    }

    /// Verify client credentials.
    ///
    /// Returns false for an unknown client and for a wrong secret without
    /// distinguishing the two.
    pub async fn verify_credentials(&self, client_id: &str, client_secret: &str) -> bool {
        let clients = self.clients.read().await;
        clients
            .get(client_id)
            .is_some_and(|c| verify_secret(client_secret, &c.secret_hash))
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry").finish()
    }
}

/// Validate a redirect URI for registration.
///
/// Must be absolute with an http(s) scheme. Plain http is only accepted for
/// loopback hosts, where TLS is unavailable by nature.
fn validate_redirect_uri(uri: &str) -> Result<(), RegistrationError> {
    let parsed =
        Url::parse(uri).map_err(|_| RegistrationError::InvalidRedirectUri(uri.to_string()))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" => {
            let host = parsed.host_str().unwrap_or_default();
            if host == "localhost" || host == "127.0.0.1" || host == "[::1]" {
                Ok(())
            } else {
                Err(RegistrationError::InvalidRedirectUri(uri.to_string()))
            }
        }
        _ => Err(RegistrationError::InvalidRedirectUri(uri.to_string())),
    }
}
