//! Error types for DPoP key operations

use thiserror::Error;

/// Errors raised by key stores and private keys
#[derive(Debug, Error)]
pub enum DPoPError {
    /// No usable private key is held by the store
    #[error("DPoP private key is unavailable")]
    KeyUnavailable,

    /// Stored key material could not be turned into a P-256 key
    #[error("Invalid DPoP key material")]
    InvalidKey,

    /// The cryptographic signing operation failed
    #[error("Unable to sign with the DPoP private key: {0}")]
    SigningFailed(String),

    /// A token's `cnf.jkt` does not match the key's thumbprint
    #[error("Thumbprint mismatch (token_jkt={token_jkt}, key_jkt={key_jkt})")]
    BindingMismatch {
        /// Thumbprint from the token's cnf.jkt claim
        token_jkt: String,
        /// Thumbprint of the held key
        key_jkt: String,
    },

    /// Backend-specific failure with no dedicated variant
    #[error("{0}")]
    Unknown(String),
}

impl DPoPError {
    /// Wrap a backend failure message
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown(message.into())
    }
}
