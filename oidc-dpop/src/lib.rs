//! # DPoP key capability (RFC 9449)
//!
//! This crate owns the private key side of OAuth 2.0 DPoP (Demonstrating
//! Proof of Possession, [RFC 9449](https://datatracker.ietf.org/doc/html/rfc9449)).
//! Tokens issued to a DPoP client are bound to the thumbprint of its public
//! key; every request then carries a proof JWT signed with the private key.
//!
//! The crate stops at the signing primitive. The token-request
//! layer assembles the proof (`typ`, `alg`, `jwk`, `htm`, `htu`, `iat`,
//! `jti`, ...) and asks the key for a signature over `header.payload`.
//!
//! ## Quick Start
//!
//! ```rust
//! use oidc_dpop::{DPoPError, DPoPKeyStore, DPoPPrivateKey, MemoryKeyStore};
//!
//! let store = MemoryKeyStore::create_on_demand();
//!
//! let key = store.private_key()?;
//! println!("jkt: {}", key.thumbprint());
//!
//! let signature = key.signature(b"eyJ0eXAiOiJkcG9wK2p3dCJ9.eyJodG0iOiJQT1NUIn0")?;
//! assert_eq!(signature.to_bytes().len(), 64);
//!
//! store.clear()?;
//! assert!(!store.has_private_key()?);
//! # Ok::<(), DPoPError>(())
//! ```
//!
//! ## Backends
//!
//! [`DPoPKeyStore`] is the seam for key storage. [`MemoryKeyStore`] keeps a
//! software key in process memory; persistent backends (OS keyring, files)
//! live with the host application and implement the same trait.
//!
//! ## Algorithm Support
//!
//! - **ES256** (ECDSA with P-256 and SHA-256), as recommended by RFC 9449

mod challenge;
mod error;
mod jwk;
mod key;
mod store;
mod thumbprint;

pub use challenge::{DPoPChallenge, NONCE_REQUIRED_ERROR_CODE};
pub use error::DPoPError;
pub use jwk::{EcPublicJwk, JwkThumbprint};
pub use key::{DPoPPrivateKey, SoftwareKey, JWS_ALGORITHM};
pub use store::{DPoPKeyStore, MemoryKeyStore};
pub use thumbprint::{compute_thumbprint, compute_thumbprint_from_jwk, verify_binding};

/// Re-exported so backends can name the key and signature types
pub use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
