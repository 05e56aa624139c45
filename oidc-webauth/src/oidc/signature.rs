//! ID token signature verification.
//!
//! Verification is CPU-bound (RSA in particular) and key lookup may block on
//! a JWKS fetch, so [`SignatureValidator`] is synchronous and the pipeline
//! runs it on tokio's blocking pool.

use std::sync::Arc;

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk};
use jsonwebtoken::{Algorithm, DecodingKey};

use crate::oidc::jwks::{JwksError, KeySetSource};
use crate::oidc::token::IdToken;
use crate::oidc::validation::ValidationError;

/// Algorithms an ID token may be signed with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    RS256,
    ES256,
    /// Symmetric; only honoured when the host supplies the client secret
    HS256,
}

impl SigningAlgorithm {
    /// Select the algorithm named by a JOSE `alg` header.
    ///
    /// HS256 is selectable only when `allow_hs256` is set. Anything else,
    /// including `none`, is unsupported.
    pub fn select(alg: &str, allow_hs256: bool) -> Result<Self, ValidationError> {
        match alg {
            "RS256" => Ok(Self::RS256),
            "ES256" => Ok(Self::ES256),
            "HS256" if allow_hs256 => Ok(Self::HS256),
            other => Err(ValidationError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::ES256 => "ES256",
            Self::HS256 => "HS256",
        }
    }

    pub fn is_symmetric(&self) -> bool {
        matches!(self, Self::HS256)
    }

    fn jose(&self) -> Algorithm {
        match self {
            Self::RS256 => Algorithm::RS256,
            Self::ES256 => Algorithm::ES256,
            Self::HS256 => Algorithm::HS256,
        }
    }

    /// Whether a JWK's key type can carry this algorithm
    fn accepts(&self, jwk: &Jwk) -> bool {
        matches!(
            (self, &jwk.algorithm),
            (Self::RS256, AlgorithmParameters::RSA(_))
                | (Self::ES256, AlgorithmParameters::EllipticCurve(_))
        )
    }

    /// Check `signature` over `signing_input` with `key`.
    ///
    /// Returns false for an empty or undecodable signature and for any
    /// verification failure.
    pub fn verify(&self, signing_input: &str, signature: &str, key: &DecodingKey) -> bool {
        if signature.is_empty() {
            return false;
        }
        jsonwebtoken::crypto::verify(signature, signing_input.as_bytes(), key, self.jose())
            .unwrap_or(false)
    }
}

impl std::fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The signature stage of the ID token pipeline.
///
/// Implementations are called on a blocking-pool thread, never on the thread
/// that started validation.
pub trait SignatureValidator: Send + Sync {
    fn validate(&self, token: &IdToken, algorithm: SigningAlgorithm)
        -> Result<(), ValidationError>;
}

/// Verifies signatures against the issuer's key set, or a shared secret for
/// HS256.
pub struct IdTokenSignatureValidator {
    key_set: Arc<dyn KeySetSource>,
    shared_secret: Option<Vec<u8>>,
}

impl IdTokenSignatureValidator {
    pub fn new(key_set: Arc<dyn KeySetSource>) -> Self {
        Self {
            key_set,
            shared_secret: None,
        }
    }

    /// Also verify HS256 tokens with the client secret
    pub fn with_shared_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.shared_secret = Some(secret.into());
        self
    }

    fn decoding_key(
        &self,
        token: &IdToken,
        algorithm: SigningAlgorithm,
    ) -> Result<DecodingKey, ValidationError> {
        if algorithm.is_symmetric() {
            let secret = self
                .shared_secret
                .as_deref()
                .ok_or_else(|| ValidationError::UnsupportedAlgorithm(algorithm.to_string()))?;
            return Ok(DecodingKey::from_secret(secret));
        }

        let kid = token
            .header()
            .kid
            .as_deref()
            .ok_or(ValidationError::MissingPublicKey { kid: None })?;

        let jwk = self.key_set.key(kid).map_err(|e| match e {
            JwksError::KeyNotFound(kid) => ValidationError::MissingPublicKey { kid: Some(kid) },
            JwksError::NoKeys => ValidationError::MissingPublicKey {
                kid: Some(kid.to_string()),
            },
            other => ValidationError::KeySet(other),
        })?;

        if !algorithm.accepts(&jwk) {
            return Err(ValidationError::InvalidSignature(format!(
                "key {} cannot verify {}",
                kid, algorithm
            )));
        }

        DecodingKey::from_jwk(&jwk).map_err(|e| {
            ValidationError::InvalidSignature(format!("unusable key {}: {}", kid, e))
        })
    }
}

impl SignatureValidator for IdTokenSignatureValidator {
    fn validate(
        &self,
        token: &IdToken,
        algorithm: SigningAlgorithm,
    ) -> Result<(), ValidationError> {
        let key = self.decoding_key(token, algorithm)?;

        if algorithm.verify(token.signing_input(), token.signature(), &key) {
            Ok(())
        } else {
            Err(ValidationError::InvalidSignature(format!(
                "{} signature does not verify",
                algorithm
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oidc::jwks::StaticKeySet;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &[u8] = b"client-secret-at-least-32-bytes-long";

    fn hs256_token(secret: &[u8]) -> IdToken {
        let claims = serde_json::json!({ "iss": "https://issuer.example.com/", "sub": "user" });
        let raw = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap();
        IdToken::decode(&raw).unwrap()
    }

    fn empty_key_set() -> Arc<dyn KeySetSource> {
        Arc::new(StaticKeySet::from_json(r#"{"keys":[]}"#).unwrap())
    }

    #[test]
    fn test_select_supported() {
        assert_eq!(
            SigningAlgorithm::select("RS256", false).unwrap(),
            SigningAlgorithm::RS256
        );
        assert_eq!(
            SigningAlgorithm::select("ES256", false).unwrap(),
            SigningAlgorithm::ES256
        );
        assert_eq!(
            SigningAlgorithm::select("HS256", true).unwrap(),
            SigningAlgorithm::HS256
        );
    }

    #[test]
    fn test_select_unsupported() {
        for alg in ["none", "RS512", "PS256", "EdDSA", "", "rs256"] {
            assert!(matches!(
                SigningAlgorithm::select(alg, true),
                Err(ValidationError::UnsupportedAlgorithm(a)) if a == alg
            ));
        }
        // HS256 is unsupported unless enabled
        assert!(matches!(
            SigningAlgorithm::select("HS256", false),
            Err(ValidationError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_hs256_with_matching_secret() {
        let validator =
            IdTokenSignatureValidator::new(empty_key_set()).with_shared_secret(SECRET.to_vec());

        let token = hs256_token(SECRET);
        assert!(validator.validate(&token, SigningAlgorithm::HS256).is_ok());
    }

    #[test]
    fn test_hs256_with_wrong_secret() {
        let validator =
            IdTokenSignatureValidator::new(empty_key_set()).with_shared_secret(SECRET.to_vec());

        let token = hs256_token(b"some-other-secret-of-enough-length!!");
        assert!(matches!(
            validator.validate(&token, SigningAlgorithm::HS256),
            Err(ValidationError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_hs256_without_secret_is_unsupported() {
        let validator = IdTokenSignatureValidator::new(empty_key_set());
        let token = hs256_token(SECRET);

        assert!(matches!(
            validator.validate(&token, SigningAlgorithm::HS256),
            Err(ValidationError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_empty_signature_never_verifies() {
        let key = DecodingKey::from_secret(SECRET);
        let token = hs256_token(SECRET);

        assert!(!SigningAlgorithm::HS256.verify(token.signing_input(), "", &key));
        assert!(SigningAlgorithm::HS256.verify(token.signing_input(), token.signature(), &key));
    }

    #[test]
    fn test_missing_kid() {
        let validator = IdTokenSignatureValidator::new(empty_key_set());
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256"}"#);
        let payload = URL_SAFE_NO_PAD.encode("{}");
        let token = IdToken::decode(&format!("{}.{}.c2ln", header, payload)).unwrap();

        assert!(matches!(
            validator.validate(&token, SigningAlgorithm::RS256),
            Err(ValidationError::MissingPublicKey { kid: None })
        ));
    }

    #[test]
    fn test_empty_key_set_is_missing_public_key() {
        let validator = IdTokenSignatureValidator::new(empty_key_set());
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","kid":"k1"}"#);
        let payload = URL_SAFE_NO_PAD.encode("{}");
        let token = IdToken::decode(&format!("{}.{}.c2ln", header, payload)).unwrap();

        assert!(matches!(
            validator.validate(&token, SigningAlgorithm::RS256),
            Err(ValidationError::MissingPublicKey { kid: Some(kid) }) if kid == "k1"
        ));
    }

    #[test]
    fn test_key_type_must_match_algorithm() {
        let key_set: Arc<dyn KeySetSource> = Arc::new(
            StaticKeySet::from_json(
                r#"{"keys":[{"kty":"RSA","kid":"rsa-1","use":"sig","n":"AQAB","e":"AQAB"}]}"#,
            )
            .unwrap(),
        );
        let validator = IdTokenSignatureValidator::new(key_set);
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"ES256","kid":"rsa-1"}"#);
        let payload = URL_SAFE_NO_PAD.encode("{}");
        let token = IdToken::decode(&format!("{}.{}.c2ln", header, payload)).unwrap();

        assert!(matches!(
            validator.validate(&token, SigningAlgorithm::ES256),
            Err(ValidationError::InvalidSignature(_))
        ));
    }
}
