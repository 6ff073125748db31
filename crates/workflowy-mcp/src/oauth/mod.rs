//! OAuth 2.0 authorization server for Workflowy credential mediation.
//!
//! Implements a self-contained OAuth server embedded in the binary. Instead
//! of a user account login, the consent page collects the user's Workflowy
//! API key; approving a client means handing it a token that carries that key
//! in encrypted form. There is no separate resource-owner identity.
//!
//! ## Supported Standards
//! - RFC 9728: OAuth Protected Resource Metadata
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7636: PKCE (S256)
//! - RFC 6749: Authorization Code Grant

pub mod consent;
pub mod crypto;
pub mod handlers;
pub mod pkce;
pub mod registry;
pub mod store;
pub mod tokens;

pub use crypto::CredentialCipher;
pub use registry::ClientRegistry;
pub use store::GrantStore;
pub use tokens::AccessTokenCodec;
