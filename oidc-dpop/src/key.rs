//! Private key capability used to sign DPoP proofs

use p256::ecdsa::{signature::Signer, Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::rand_core::OsRng;

use crate::error::DPoPError;
use crate::jwk::{EcPublicJwk, JwkThumbprint};
use crate::thumbprint::compute_thumbprint;

/// JWS algorithm identifier for P-256 keys
pub const JWS_ALGORITHM: &str = "ES256";

/// A proof-of-possession private key.
///
/// The key never leaves its backend: callers get the public half and
/// signatures over bytes they assemble themselves (the proof JWT's
/// `header.payload` signing input).
pub trait DPoPPrivateKey: Send + Sync {
    /// The public half of the key
    fn public_key(&self) -> VerifyingKey;

    /// Sign `data` with ECDSA P-256 / SHA-256
    fn signature(&self, data: &[u8]) -> Result<Signature, DPoPError>;

    /// JWS `alg` value to put in the proof header
    fn jws_algorithm(&self) -> &'static str {
        JWS_ALGORITHM
    }

    /// Public key as an EC JWK, for the proof header's `jwk` member
    fn public_jwk(&self) -> EcPublicJwk {
        EcPublicJwk::from_verifying_key(&self.public_key())
    }

    /// RFC 7638 thumbprint of the public key (the `cnf.jkt` of bound tokens)
    fn thumbprint(&self) -> JwkThumbprint {
        compute_thumbprint(&self.public_key())
    }
}

/// Software P-256 key held in process memory
pub struct SoftwareKey {
    signing_key: SigningKey,
}

impl SoftwareKey {
    /// Create a key from a fresh random P-256 scalar
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Wrap an existing signing key
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// Import a key from its 32-byte scalar
    pub fn import_key(bytes: &[u8]) -> Result<Self, DPoPError> {
        let signing_key = SigningKey::from_slice(bytes).map_err(|_| DPoPError::InvalidKey)?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// Export the 32-byte scalar (for secure storage)
    pub fn export_key(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }
}

impl DPoPPrivateKey for SoftwareKey {
    fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key().clone()
    }

    fn signature(&self, data: &[u8]) -> Result<Signature, DPoPError> {
        self.signing_key
            .try_sign(data)
            .map_err(|e| DPoPError::SigningFailed(e.to_string()))
    }
}

impl std::fmt::Debug for SoftwareKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareKey")
            .field("thumbprint", &self.thumbprint().as_str())
            .finish_non_exhaustive()
    }
}
