//! In-memory storage for authorization codes and refresh tokens.
//!
//! Both tables carry the user's Workflowy API key only in encrypted form.
//! Refresh tokens are keyed by their deterministic lookup hash, so the map
//! never holds the bearer value itself.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::crypto::{generate_secret, hash_lookup_token};
use crate::config::api;

/// State bound to an issued authorization code.
#[derive(Debug, Clone)]
pub struct AuthCodeGrant {
    pub client_id: String,
    pub redirect_uri: String,
    pub code_challenge: String,
    pub scope: String,
    /// Encrypted Workflowy API key blob.
    pub encrypted_api_key: String,
    pub expires_at: DateTime<Utc>,
}

/// State bound to an issued refresh token.
#[derive(Debug, Clone)]
pub struct RefreshGrant {
    pub client_id: String,
    pub scope: String,
    /// Encrypted Workflowy API key blob.
    pub encrypted_api_key: String,
    pub expires_at: DateTime<Utc>,
}

/// In-memory grant store shared across request handlers.
#[derive(Clone, Default)]
pub struct GrantStore {
    auth_codes: Arc<RwLock<HashMap<String, AuthCodeGrant>>>,
    refresh_tokens: Arc<RwLock<HashMap<String, RefreshGrant>>>,
}

impl GrantStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue an authorization code bound to an approved request.
    pub async fn create_auth_code(
        &self,
        client_id: String,
        redirect_uri: String,
        code_challenge: String,
        scope: String,
        encrypted_api_key: String,
    ) -> String {
        let code = generate_secret();
        self.auth_codes.write().await.insert(
            code.clone(),
            AuthCodeGrant {
                client_id,
                redirect_uri,
                code_challenge,
                scope,
                encrypted_api_key,
                expires_at: Utc::now() + api::AUTH_CODE_TTL,
            },
        );
        code
    }

    /// Redeem an authorization code.
    ///
    /// The code is removed from the table before any further checks, so a
    /// concurrent second redemption observes an absent entry. An expired code
    /// is removed and reported as absent too.
    pub async fn consume_auth_code(&self, code: &str) -> Option<AuthCodeGrant> {
        let grant = self.auth_codes.write().await.remove(code)?;
        if grant.expires_at <= Utc::now() {
            return None;
        }
        Some(grant)
    }

    /// Issue a refresh token, storing its grant under the lookup hash.
    pub async fn create_refresh_token(
        &self,
        client_id: String,
        scope: String,
        encrypted_api_key: String,
    ) -> String {
        let token = generate_secret();
        self.refresh_tokens.write().await.insert(
            hash_lookup_token(&token),
            RefreshGrant {
                client_id,
                scope,
                encrypted_api_key,
                expires_at: Utc::now() + api::REFRESH_TOKEN_TTL,
            },
        );
        token
    }

    /// Look up a refresh token without consuming it. Expired grants read as
    /// absent.
    pub async fn get_refresh_grant(&self, token: &str) -> Option<RefreshGrant> {
        let grants = self.refresh_tokens.read().await;
        let grant = grants.get(&hash_lookup_token(token))?;
        if grant.expires_at <= Utc::now() {
            return None;
        }
        Some(grant.clone())
    }

    /// Remove a refresh token.
    ///
    /// Returns whether an entry was actually removed. During rotation a false
    /// return means another request already rotated this token, and the caller
    /// must not issue new tokens for it.
    pub async fn delete_refresh_token(&self, token: &str) -> bool {
        self.refresh_tokens.write().await.remove(&hash_lookup_token(token)).is_some()
    }

    /// Drop every expired entry. Returns the number removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut removed = 0;

        {
            let mut codes = self.auth_codes.write().await;
            let before = codes.len();
            codes.retain(|_, grant| grant.expires_at > now);
            removed += before - codes.len();
        }
        {
            let mut tokens = self.refresh_tokens.write().await;
            let before = tokens.len();
            tokens.retain(|_, grant| grant.expires_at > now);
            removed += before - tokens.len();
        }

        if removed > 0 {
            tracing::debug!(count = removed, "Swept expired grants");
        }
        removed
    }

    /// Start the background sweep task.
    pub fn start_sweep_task(self) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(api::SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                self.sweep_expired().await;
            }
        });
    }

    #[cfg(test)]
    async fn insert_expired_code(&self, code: &str, grant_client: &str) {
        self.auth_codes.write().await.insert(
            code.to_string(),
            AuthCodeGrant {
                client_id: grant_client.to_string(),
                redirect_uri: "https://app.example/cb".into(),
                code_challenge: "challenge".into(),
                scope: api::SCOPE.into(),
                encrypted_api_key: "aa:bb:cc".into(),
                expires_at: Utc::now() - std::time::Duration::from_secs(1),
            },
        );
    }
}

impl std::fmt::Debug for GrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantStore").finish()
    }
}
