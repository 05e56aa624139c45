//! JWK Thumbprint computation (RFC 7638)

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use p256::ecdsa::VerifyingKey;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::DPoPError;
use crate::jwk::{EcPublicJwk, JwkThumbprint};

/// Compute the JWK thumbprint of a P-256 verifying key
pub fn compute_thumbprint(verifying_key: &VerifyingKey) -> JwkThumbprint {
    compute_thumbprint_from_jwk(&EcPublicJwk::from_verifying_key(verifying_key))
}

/// Compute the JWK thumbprint of an EC public JWK.
///
/// The hash input is the canonical JSON with members in lexicographic order:
/// `{"crv":"P-256","kty":"EC","x":"...","y":"..."}`
pub fn compute_thumbprint_from_jwk(jwk: &EcPublicJwk) -> JwkThumbprint {
    // crv < kty < x < y
    let canonical = format!(
        r#"{{"crv":"{}","kty":"{}","x":"{}","y":"{}"}}"#,
        jwk.crv, jwk.kty, jwk.x, jwk.y
    );

    let hash = Sha256::digest(canonical.as_bytes());
    JwkThumbprint::new(URL_SAFE_NO_PAD.encode(hash))
}

/// Check that a token's `cnf.jkt` binds it to the given thumbprint.
///
/// Comparison is constant-time.
pub fn verify_binding(token_jkt: &str, key_thumbprint: &JwkThumbprint) -> Result<(), DPoPError> {
    let expected = key_thumbprint.as_str().as_bytes();
    let actual = token_jkt.as_bytes();

    if expected.len() == actual.len() && bool::from(expected.ct_eq(actual)) {
        Ok(())
    } else {
        Err(DPoPError::BindingMismatch {
            token_jkt: token_jkt.to_string(),
            key_jkt: key_thumbprint.to_string(),
        })
    }
}
