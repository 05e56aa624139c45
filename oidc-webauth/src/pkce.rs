//! PKCE (RFC 7636) verifier/challenge generation.
//!
//! The verifier is 32 bytes of CSPRNG output, base64url-encoded without
//! padding (always 43 characters). The challenge is
//! `BASE64URL(SHA256(ASCII(verifier)))`, sent with
//! `code_challenge_method=S256` at the authorize step; the verifier itself
//! goes to the token endpoint as `code_verifier`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};

/// The only challenge method this client sends
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// Number of random bytes behind a verifier
pub const VERIFIER_BYTES: usize = 32;

/// A PKCE verifier and its lazily derived S256 challenge
pub struct Pkce {
    verifier: String,
    challenge: OnceCell<String>,
}

impl Pkce {
    /// Generate a verifier from the operating system CSPRNG.
    ///
    /// # Panics
    ///
    /// Panics if secure random number generation fails. A client that cannot
    /// obtain randomness cannot produce an unguessable verifier, and on a
    /// working system getrandom does not fail.
    pub fn new() -> Self {
        let mut bytes = [0u8; VERIFIER_BYTES];
        getrandom::getrandom(&mut bytes).expect(
            "secure random number generation failed - \
             system may be misconfigured or compromised",
        );
        Self::from_verifier_bytes(bytes)
    }

    /// Build from caller-supplied verifier bytes (deterministic tests)
    pub fn from_verifier_bytes(bytes: [u8; VERIFIER_BYTES]) -> Self {
        Self {
            verifier: URL_SAFE_NO_PAD.encode(bytes),
            challenge: OnceCell::new(),
        }
    }

    /// The `code_verifier` value
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// The `code_challenge` value, computed on first use
    pub fn challenge(&self) -> &str {
        self.challenge
            .get_or_init(|| URL_SAFE_NO_PAD.encode(Sha256::digest(self.verifier.as_bytes())))
    }

    /// The `code_challenge_method` value
    pub fn method(&self) -> &'static str {
        CODE_CHALLENGE_METHOD
    }
}

impl Default for Pkce {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Pkce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The verifier is the secret half; only the challenge is public
        f.debug_struct("Pkce")
            .field("challenge", &self.challenge())
            .field("method", &self.method())
            .finish_non_exhaustive()
    }
}
