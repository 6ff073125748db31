//! Access token issuance and verification.
//!
//! Access tokens are self-contained HS256 JWTs carrying the Workflowy API key
//! encrypted under the server's encryption key. Validity is determined
//! entirely by signature and expiry at the moment of use: there is no
//! server-side revocation list, so a leaked token stays usable until its
//! `exp` passes. That is an accepted limitation of this design.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::crypto::CredentialCipher;
use crate::config::api;
use crate::error::{CryptoError, CryptoResult};

/// JWT claim set for access tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the OAuth client id the token was issued to.
    pub sub: String,
    /// Issuer URL.
    pub iss: String,
    /// Audience (same as issuer for this single-resource server).
    pub aud: String,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Granted scope.
    pub scope: String,
    /// Encrypted Workflowy API key blob.
    pub wf_key: String,
}

/// The result of successfully verifying a bearer token.
#[derive(Debug)]
pub struct VerifiedToken {
    /// The decrypted Workflowy API key.
    pub api_key: String,
    /// The client the token was issued to.
    pub client_id: String,
    /// Granted scope.
    pub scope: String,
}

/// Signs and verifies the access-token bearer format.
#[derive(Clone)]
pub struct AccessTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    cipher: CredentialCipher,
}

impl AccessTokenCodec {
    /// Build a codec from the configured signing secret.
    ///
    /// # Errors
    ///
    /// `CryptoError::MissingKey` when no JWT secret is configured.
    pub fn new(
        jwt_secret: Option<&str>,
        issuer: &str,
        cipher: CredentialCipher,
    ) -> CryptoResult<Self> {
        let secret = jwt_secret.ok_or(CryptoError::MissingKey("JWT_SECRET"))?;
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            cipher,
        })
    }

    /// Issue a signed access token embedding the encrypted API key.
    pub fn issue(&self, client_id: &str, api_key: &str, ttl: Duration) -> CryptoResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: client_id.to_string(),
            iss: self.issuer.clone(),
            aud: self.issuer.clone(),
            exp: now + i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
            iat: now,
            scope: api::SCOPE.to_string(),
            wf_key: self.cipher.encrypt(api_key)?,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|_| CryptoError::AuthenticationFailed)
    }

    /// Verify a bearer token and recover the Workflowy API key.
    ///
    /// Returns `None` for any failure: bad signature, wrong algorithm, wrong
    /// issuer or audience, expired, or undecryptable credential. Invalid
    /// tokens are the expected case on this path, not an error; callers must
    /// treat `None` as "no authorization present".
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<VerifiedToken> {
        // Pin HS256: any other algorithm in the header is rejected outright,
        // which closes the algorithm-confusion class of attacks
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.issuer]);

        let data = match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected bearer token");
                return None;
            }
        };

        let api_key = self.cipher.decrypt(&data.claims.wf_key).ok()?;

        Some(VerifiedToken { api_key, client_id: data.claims.sub, scope: data.claims.scope })
    }
}

impl std::fmt::Debug for AccessTokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenCodec").field("issuer", &self.issuer).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_codec() -> AccessTokenCodec {
        let cipher = CredentialCipher::new(Some(&"ab".repeat(32))).unwrap();
        AccessTokenCodec::new(Some("test-secret"), "https://mcp.example", cipher).unwrap()
    }

    #[test]
    fn test_missing_secret() {
        let cipher = CredentialCipher::new(Some(&"ab".repeat(32))).unwrap();
        assert!(matches!(
            AccessTokenCodec::new(None, "https://mcp.example", cipher),
            Err(CryptoError::MissingKey(_))
        ));
    }

    #[test]
    fn test_issue_and_verify() {
        let codec = test_codec();
        let token = codec.issue("client-1", "wf_key_xyz", Duration::from_secs(3600)).unwrap();

        let verified = codec.verify(&token).unwrap();
        assert_eq!(verified.api_key, "wf_key_xyz");
        assert_eq!(verified.client_id, "client-1");
        assert_eq!(verified.scope, "workflowy");
    }

    #[test]
    fn test_expired_token_rejected() {
        let codec = test_codec();
        let token = codec.issue("client-1", "wf_key_xyz", Duration::from_secs(0)).unwrap();

        std::thread::sleep(Duration::from_millis(1100));
        assert!(codec.verify(&token).is_none());
    }

    #[test]
    fn test_garbage_rejected() {
        let codec = test_codec();
        assert!(codec.verify("not-a-jwt").is_none());
        assert!(codec.verify("").is_none());
    }

    #[test]
    fn test_wrong_signing_key_rejected() {
        let cipher = CredentialCipher::new(Some(&"ab".repeat(32))).unwrap();
        let other =
            AccessTokenCodec::new(Some("other-secret"), "https://mcp.example", cipher).unwrap();

        let token = test_codec().issue("client-1", "wf_key_xyz", Duration::from_secs(3600)).unwrap();
        assert!(other.verify(&token).is_none());
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let cipher = CredentialCipher::new(Some(&"ab".repeat(32))).unwrap();
        let other = AccessTokenCodec::new(Some("test-secret"), "https://evil.example", cipher).unwrap();

        let token = test_codec().issue("client-1", "wf_key_xyz", Duration::from_secs(3600)).unwrap();
        assert!(other.verify(&token).is_none());
    }
}
