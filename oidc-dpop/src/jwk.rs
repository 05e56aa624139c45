//! JSON Web Key (JWK) types for DPoP

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use p256::ecdsa::VerifyingKey;
use serde::{Deserialize, Serialize};

/// EC public key in JWK format (P-256/ES256)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcPublicJwk {
    /// Key type (always "EC")
    pub kty: String,
    /// Curve name (always "P-256" for ES256)
    pub crv: String,
    /// X coordinate (base64url-encoded)
    pub x: String,
    /// Y coordinate (base64url-encoded)
    pub y: String,
}

impl EcPublicJwk {
    /// Create a new EC public JWK for P-256
    pub fn new(x: String, y: String) -> Self {
        Self {
            kty: "EC".to_string(),
            crv: "P-256".to_string(),
            x,
            y,
        }
    }

    /// Build the JWK for a verifying key.
    ///
    /// The x/y coordinates are the two 32-byte halves of the uncompressed
    /// SEC1 point, each base64url-encoded without padding.
    pub fn from_verifying_key(verifying_key: &VerifyingKey) -> Self {
        let point = verifying_key.to_encoded_point(false);
        // Uncompressed points always carry both coordinates; the identity point
        // cannot be a verifying key.
        let x = point.x().map(|x| URL_SAFE_NO_PAD.encode(x)).unwrap_or_default();
        let y = point.y().map(|y| URL_SAFE_NO_PAD.encode(y)).unwrap_or_default();
        Self::new(x, y)
    }
}

/// JWK Thumbprint (RFC 7638)
///
/// A thumbprint is a SHA-256 hash of the canonical JSON representation
/// of a JWK, providing a unique identifier for the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JwkThumbprint(String);

impl JwkThumbprint {
    /// Create a new thumbprint from a base64url-encoded string
    pub fn new(thumbprint: String) -> Self {
        Self(thumbprint)
    }

    /// Get the thumbprint as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JwkThumbprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for JwkThumbprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<JwkThumbprint> for String {
    fn from(t: JwkThumbprint) -> Self {
        t.0
    }
}
