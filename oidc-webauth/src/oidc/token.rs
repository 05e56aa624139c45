//! ID token decoding and claims extraction.
//!
//! Decoding only splits the compact serialization and parses the header and
//! payload JSON. Nothing here is trusted until the signature and claim
//! stages in [`crate::oidc::validation`] have passed.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to decode token: {0}")]
    DecodeError(String),
    #[error("Invalid token format")]
    InvalidFormat,
}

/// JOSE header fields the validator looks at
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Kept as a raw string so unknown or hostile values (`none`) surface as
    /// an unsupported algorithm rather than a decode failure
    pub alg: String,

    #[serde(default)]
    pub kid: Option<String>,

    #[serde(default)]
    pub typ: Option<String>,
}

/// ID token claims.
///
/// Every claim is optional at this layer; presence is enforced by the claim
/// validators so a missing claim is reported by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer
    #[serde(default)]
    pub iss: Option<String>,

    /// Subject (user identifier)
    #[serde(default)]
    pub sub: Option<String>,

    /// Audience
    #[serde(default)]
    pub aud: Option<StringOrVec>,

    /// Expiration time (seconds since epoch)
    #[serde(default, deserialize_with = "numeric_date")]
    pub exp: Option<i64>,

    /// Issued at (seconds since epoch)
    #[serde(default, deserialize_with = "numeric_date")]
    pub iat: Option<i64>,

    #[serde(default)]
    pub nonce: Option<String>,

    /// Authorized party
    #[serde(default)]
    pub azp: Option<String>,

    /// Authentication time (seconds since epoch)
    #[serde(default, deserialize_with = "numeric_date")]
    pub auth_time: Option<i64>,

    #[serde(default)]
    pub org_id: Option<String>,

    #[serde(default)]
    pub org_name: Option<String>,

    /// Everything else the issuer put in the token
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// RFC 7519 NumericDate; fractional seconds are floored
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumericDate {
        Seconds(i64),
        Fractional(f64),
    }

    Ok(
        Option::<NumericDate>::deserialize(deserializer)?.map(|date| match date {
            NumericDate::Seconds(seconds) => seconds,
            NumericDate::Fractional(seconds) => seconds.floor() as i64,
        }),
    )
}

/// Handle audience as string or array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrVec {
    String(String),
    Vec(Vec<String>),
}

impl StringOrVec {
    /// Check if the audience contains a specific value
    pub fn contains(&self, value: &str) -> bool {
        match self {
            StringOrVec::String(s) => s == value,
            StringOrVec::Vec(v) => v.iter().any(|s| s == value),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            StringOrVec::String(_) => 1,
            StringOrVec::Vec(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Comma-joined form for error messages
    pub fn joined(&self) -> String {
        match self {
            StringOrVec::String(s) => s.clone(),
            StringOrVec::Vec(v) => v.join(", "),
        }
    }
}

/// A decoded, not yet validated, ID token
#[derive(Debug, Clone)]
pub struct IdToken {
    header: TokenHeader,
    claims: IdTokenClaims,
    signing_input: String,
    signature: String,
}

impl IdToken {
    /// Split a compact JWS and parse its header and payload
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(TokenError::InvalidFormat);
        }

        let header = decode_segment(parts[0])?;
        let claims = decode_segment(parts[1])?;

        Ok(Self {
            header,
            claims,
            signing_input: format!("{}.{}", parts[0], parts[1]),
            signature: parts[2].to_string(),
        })
    }

    /// Parse only the header, leaving the payload untouched
    pub fn decode_header(token: &str) -> Result<TokenHeader, TokenError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(TokenError::InvalidFormat);
        }
        decode_segment(parts[0])
    }

    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    pub fn claims(&self) -> &IdTokenClaims {
        &self.claims
    }

    pub fn into_claims(self) -> IdTokenClaims {
        self.claims
    }

    /// `header.payload` exactly as received
    pub fn signing_input(&self) -> &str {
        &self.signing_input
    }

    /// The base64url signature segment, possibly empty
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let decoded =
        base64_decode_url_safe(segment).map_err(|e| TokenError::DecodeError(e.to_string()))?;
    serde_json::from_slice(&decoded).map_err(|e| TokenError::DecodeError(e.to_string()))
}

fn base64_decode_url_safe(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    // Strip any padding characters to handle both padded and unpadded base64url
    let trimmed = input.trim_end_matches('=');
    URL_SAFE_NO_PAD.decode(trimmed)
}
