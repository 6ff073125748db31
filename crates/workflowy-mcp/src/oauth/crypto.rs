//! Encryption, hashing, and token generation for the OAuth layer.
//!
//! AES-256-GCM for credential encryption (authenticated), salted SHA-256 for
//! client secret hashes, deterministic SHA-256 for refresh-token lookup, and
//! OS-randomness for identifiers and opaque secrets.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::{Aes256Gcm, KeyInit, aead::Aead};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{CryptoError, CryptoResult};

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;
/// AES-GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;
/// Salt length for secret hashing in bytes.
const SALT_LEN: usize = 16;

/// Authenticated symmetric encryption of the upstream Workflowy API key.
///
/// Blobs are self-describing: `nonce:tag:ciphertext`, all hex encoded, so any
/// blob can be decrypted independently given the key.
#[derive(Clone)]
pub struct CredentialCipher {
    key: [u8; 32],
}

impl CredentialCipher {
    /// Build a cipher from a 64-character hex key.
    ///
    /// # Errors
    ///
    /// `CryptoError::MissingKey` when no key is configured,
    /// `CryptoError::KeyFormat` when the key is not exactly 32 bytes of hex.
    pub fn new(hex_key: Option<&str>) -> CryptoResult<Self> {
        let hex_key = hex_key.ok_or(CryptoError::MissingKey("ENCRYPTION_KEY"))?;
        let bytes = hex::decode(hex_key)
            .map_err(|e| CryptoError::KeyFormat(format!("not valid hex: {e}")))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::KeyFormat("must be a 64-character hex string (32 bytes)".into()))?;
        Ok(Self { key })
    }

    /// Encrypt a plaintext credential into a `nonce:tag:ciphertext` hex blob.
    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.key));

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = GenericArray::from_slice(&nonce_bytes);

        // aes-gcm appends the tag to the ciphertext; split it back out so the
        // blob layout matches the stored format
        let mut sealed = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::AuthenticationFailed)?;
        let tag = sealed.split_off(sealed.len() - TAG_LEN);

        Ok(format!("{}:{}:{}", hex::encode(nonce_bytes), hex::encode(tag), hex::encode(sealed)))
    }

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// `CryptoError::MalformedCiphertext` when the blob does not have three
    /// hex parts, `CryptoError::AuthenticationFailed` when the tag check
    /// fails. No partial plaintext is ever returned.
    pub fn decrypt(&self, blob: &str) -> CryptoResult<String> {
        let parts: Vec<&str> = blob.split(':').collect();
        if parts.len() != 3 {
            return Err(CryptoError::MalformedCiphertext);
        }

        let nonce_bytes = hex::decode(parts[0]).map_err(|_| CryptoError::MalformedCiphertext)?;
        let tag = hex::decode(parts[1]).map_err(|_| CryptoError::MalformedCiphertext)?;
        let ciphertext = hex::decode(parts[2]).map_err(|_| CryptoError::MalformedCiphertext)?;
        if nonce_bytes.len() != NONCE_LEN || tag.len() != TAG_LEN {
            return Err(CryptoError::MalformedCiphertext);
        }

        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.key));
        let nonce = GenericArray::from_slice(&nonce_bytes);

        let mut sealed = ciphertext;
        sealed.extend_from_slice(&tag);

        let plaintext = cipher
            .decrypt(nonce, sealed.as_slice())
            .map_err(|_| CryptoError::AuthenticationFailed)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::MalformedCiphertext)
    }
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher").finish()
    }
}

/// Hash a secret with a fresh random salt. Returns `salt:hash`, both hex.
#[must_use]
pub fn hash_secret(secret: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let salt_hex = hex::encode(salt);
    let hash = salted_digest(&salt_hex, secret);
    format!("{salt_hex}:{hash}")
}

/// Verify a secret against a `salt:hash` value from [`hash_secret`].
///
/// Recomputes with the stored salt and compares in constant time. Returns
/// false for malformed stored values rather than erroring.
#[must_use]
pub fn verify_secret(secret: &str, stored: &str) -> bool {
    let Some((salt_hex, hash_hex)) = stored.split_once(':') else {
        return false;
    };
    let computed = salted_digest(salt_hex, secret);
    constant_time_str_eq(&computed, hash_hex)
}

/// Deterministic hash for server-side lookup of high-entropy tokens.
///
/// Unsalted by design: refresh tokens are already ≥256 bits of randomness, and
/// lookup by hash requires the same input to always produce the same output.
#[must_use]
pub fn hash_lookup_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Generate a client identifier (UUID v4).
#[must_use]
pub fn generate_client_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Generate an opaque secret: 32 random bytes, base64url without padding.
///
/// Used for client secrets, authorization codes, and refresh tokens.
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Constant-time string equality with an up-front length check.
#[must_use]
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn salted_digest(salt_hex: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_cipher() -> CredentialCipher {
        CredentialCipher::new(Some(&"ab".repeat(32))).unwrap()
    }

    #[test]
    fn test_missing_key() {
        assert!(matches!(CredentialCipher::new(None), Err(CryptoError::MissingKey(_))));
    }

    #[test]
    fn test_bad_key_format() {
        assert!(matches!(
            CredentialCipher::new(Some("not-hex")),
            Err(CryptoError::KeyFormat(_))
        ));
        // Valid hex, wrong length
        assert!(matches!(
            CredentialCipher::new(Some("abcd")),
            Err(CryptoError::KeyFormat(_))
        ));
    }

    #[test]
    fn test_round_trip() {
        let cipher = test_cipher();
        let blob = cipher.encrypt("wf_secret_key_123").unwrap();
        assert_eq!(cipher.decrypt(&blob).unwrap(), "wf_secret_key_123");
    }

    #[test]
    fn test_round_trip_empty_and_nul() {
        let cipher = test_cipher();
        for plaintext in ["", "\0", "a\0b"] {
            let blob = cipher.encrypt(plaintext).unwrap();
            assert_eq!(cipher.decrypt(&blob).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_nonce_freshness() {
        let cipher = test_cipher();
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn test_malformed_blob() {
        let cipher = test_cipher();
        assert!(matches!(cipher.decrypt("only-one-part"), Err(CryptoError::MalformedCiphertext)));
        assert!(matches!(cipher.decrypt("a:b"), Err(CryptoError::MalformedCiphertext)));
        assert!(matches!(cipher.decrypt("zz:zz:zz"), Err(CryptoError::MalformedCiphertext)));
    }

    #[test]
    fn test_tampered_blob_fails() {
        let cipher = test_cipher();
        let blob = cipher.encrypt("wf_secret_key_123").unwrap();

        // Flip one hex digit in the ciphertext section
        let mut chars: Vec<char> = blob.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '0' { '1' } else { '0' };
        let tampered: String = chars.into_iter().collect();

        assert!(matches!(cipher.decrypt(&tampered), Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn test_wrong_key_fails() {
        let blob = test_cipher().encrypt("wf_secret_key_123").unwrap();
        let other = CredentialCipher::new(Some(&"cd".repeat(32))).unwrap();
        assert!(matches!(other.decrypt(&blob), Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn test_secret_hash_verifies() {
        let stored = hash_secret("hunter2");
        assert!(verify_secret("hunter2", &stored));
        assert!(!verify_secret("hunter3", &stored));
        assert!(!verify_secret("hunter2", "malformed"));
    }

    #[test]
    fn test_secret_hash_salted() {
        // Same secret, different salt, different stored value
        assert_ne!(hash_secret("hunter2"), hash_secret("hunter2"));
    }

    #[test]
    fn test_lookup_hash_deterministic() {
        assert_eq!(hash_lookup_token("tok"), hash_lookup_token("tok"));
        assert_ne!(hash_lookup_token("tok"), hash_lookup_token("tok2"));
    }

    #[test]
    fn test_generate_secret_entropy() {
        let a = generate_secret();
        let b = generate_secret();
        assert_ne!(a, b);
        // 32 bytes base64url without padding
        assert_eq!(a.len(), 43);
    }

    proptest! {
        #[test]
        fn prop_round_trip(plaintext in ".*") {
            let cipher = test_cipher();
            let blob = cipher.encrypt(&plaintext).unwrap();
            prop_assert_eq!(cipher.decrypt(&blob).unwrap(), plaintext);
        }
    }
}
