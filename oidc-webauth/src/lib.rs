//! Security core for OIDC web-auth clients.
//!
//! A login through the system browser runs like this:
//! 1. A [`LoginTransaction`] is created with a fresh PKCE verifier, `state`
//!    and `nonce`, and parked in the [`TransactionStore`]
//! 2. The browser redirects back; [`TransactionStore::resume`] routes the
//!    callback URL and the transaction hands out an [`AuthorizationGrant`]
//! 3. The host exchanges the code for tokens
//! 4. The ID token is checked by [`IdTokenValidator`]: signature on a
//!    blocking worker, then issuer, subject, audience, azp, expiry, iat, nonce,
//!    auth_time and organization, first failure wins
//!
//! DPoP keys come from an [`oidc_dpop::DPoPKeyStore`]; [`StorageKeyStore`]
//! persists one through the keyring or a private file.
//!
//! ## Environment Variables
//! - `OIDC_ISSUER` (required): The OIDC issuer URL
//! - `OIDC_CLIENT_ID` (optional): Expected audience, defaults to "oidc-webauth"
//! - `OIDC_LEEWAY_MS` (optional): Clock skew tolerance, defaults to 60000
//! - `OIDC_MAX_AGE_MS` (optional): Maximum age of `auth_time`
//! - `OIDC_ORGANIZATION` (optional): Required organization id or name
//! - `OIDC_DPOP_STORAGE` (optional): `keyring` (default), `file` or `memory`

#![deny(unsafe_code)]

pub mod config;
pub mod oidc;
pub mod passkey;
pub mod pkce;
pub mod storage;
pub mod transaction;

pub use config::{ClientConfig, ConfigError, KeyStorageBackend};
pub use oidc::{
    validate_id_token, IdTokenClaims, IdTokenValidator, IdTokenValidatorContext, KeySetSource,
    ValidationError,
};
pub use passkey::{ChallengeDecodeError, PasskeyLoginChallenge};
pub use pkce::Pkce;
pub use storage::{SecureStorage, StorageError, StorageKeyStore};
pub use transaction::{
    AuthTransaction, AuthorizationGrant, ClearSessionTransaction, Generation, LoginTransaction,
    TransactionStore, WebAuthError,
};
