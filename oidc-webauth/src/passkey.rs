//! Passkey login challenge decoding.
//!
//! The identity provider answers a passkey login request with an
//! authentication session id and the WebAuthn request options:
//!
//! ```json
//! {
//!   "auth_session": "...",
//!   "authn_params_public_key": {
//!     "rpId": "tenant.example.com",
//!     "challenge": "<base64url>",
//!     "userVerification": "preferred",
//!     "timeout": 60000
//!   }
//! }
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::error::Category;
use thiserror::Error;

const CHALLENGE_FORMAT_ERROR: &str = "Format of challenge is not recognized.";

#[derive(Debug, Error)]
pub enum ChallengeDecodeError {
    /// Well-formed JSON whose content is wrong: a missing field, a wrong type
    /// or an unreadable challenge
    #[error("Data corrupted: {0}")]
    DataCorrupted(String),

    #[error("Malformed JSON: {0}")]
    Syntax(String),
}

/// A decoded passkey login challenge
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "ChallengeDocument")]
pub struct PasskeyLoginChallenge {
    pub authentication_session: String,
    pub relying_party_id: String,
    /// Raw challenge bytes to hand to the platform authenticator
    pub challenge_data: Vec<u8>,
    pub user_verification: Option<String>,
    /// Milliseconds
    pub timeout: Option<u64>,
}

impl PasskeyLoginChallenge {
    pub fn from_json(json: &[u8]) -> Result<Self, ChallengeDecodeError> {
        serde_json::from_slice(json).map_err(|e| match e.classify() {
            Category::Data => ChallengeDecodeError::DataCorrupted(e.to_string()),
            _ => ChallengeDecodeError::Syntax(e.to_string()),
        })
    }
}

#[derive(Deserialize)]
struct ChallengeDocument {
    auth_session: String,
    authn_params_public_key: RequestOptions,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestOptions {
    rp_id: String,
    #[serde(deserialize_with = "challenge_bytes")]
    challenge: Vec<u8>,
    #[serde(default)]
    user_verification: Option<String>,
    #[serde(default)]
    timeout: Option<u64>,
}

impl From<ChallengeDocument> for PasskeyLoginChallenge {
    fn from(document: ChallengeDocument) -> Self {
        let options = document.authn_params_public_key;
        Self {
            authentication_session: document.auth_session,
            relying_party_id: options.rp_id,
            challenge_data: options.challenge,
            user_verification: options.user_verification,
            timeout: options.timeout,
        }
    }
}

/// The challenge must be a base64url string; anything else is corrupt data
fn challenge_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let encoded = value
        .as_str()
        .ok_or_else(|| de::Error::custom(CHALLENGE_FORMAT_ERROR))?;

    URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .map_err(|_| de::Error::custom(CHALLENGE_FORMAT_ERROR))
}
