//! `WWW-Authenticate: DPoP ...` challenge parsing (RFC 9449 section 7.1)

use once_cell::sync::Lazy;
use regex::Regex;

/// Error code a resource or token server returns when it wants a fresh nonce
pub const NONCE_REQUIRED_ERROR_CODE: &str = "use_dpop_nonce";

// Quoted values may contain spaces and commas; bare tokens may not.
const VALUE_PATTERN: &str =
    r#"\s*=\s*(?:"([\x20-\x21\x23-\x5B\x5D-\x7E]+)"|([\x21\x23-\x2B\x2D-\x5B\x5D-\x7E]+))"#;

static SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[\s,])DPoP(?:\s|$)").expect("scheme pattern is valid"));

static ERROR_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?:^|[\s,])error{}", VALUE_PATTERN)).expect("error pattern is valid")
});

static ERROR_DESCRIPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?:^|[\s,])error_description{}", VALUE_PATTERN))
        .expect("error_description pattern is valid")
});

/// A DPoP authentication challenge sent by a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DPoPChallenge {
    pub error_code: String,
    pub error_description: Option<String>,
}

impl DPoPChallenge {
    /// Parse the value of a `WWW-Authenticate` header.
    ///
    /// Returns `None` if the header carries no `DPoP` scheme or no `error`
    /// parameter.
    pub fn from_www_authenticate(header: &str) -> Option<Self> {
        if !SCHEME.is_match(header) {
            return None;
        }

        let error_code = capture_value(&ERROR_CODE, header)?;
        let error_description = capture_value(&ERROR_DESCRIPTION, header);

        Some(Self {
            error_code,
            error_description,
        })
    }

    /// Whether the server is asking for a proof carrying its `DPoP-Nonce`
    pub fn is_nonce_required(&self) -> bool {
        self.error_code == NONCE_REQUIRED_ERROR_CODE
    }
}

fn capture_value(pattern: &Regex, header: &str) -> Option<String> {
    let captures = pattern.captures(header)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_code_only() {
        let challenge =
            DPoPChallenge::from_www_authenticate(r#"DPoP error="use_dpop_nonce""#).unwrap();

        assert_eq!(challenge.error_code, "use_dpop_nonce");
        assert_eq!(challenge.error_description, None);
        assert!(challenge.is_nonce_required());
    }

    #[test]
    fn test_parse_quoted_description_with_spaces() {
        let header = r#"DPoP algs="ES256", error="invalid_dpop_proof", error_description="Invalid DPoP key binding, try again""#;
        let challenge = DPoPChallenge::from_www_authenticate(header).unwrap();

        assert_eq!(challenge.error_code, "invalid_dpop_proof");
        assert_eq!(
            challenge.error_description.as_deref(),
            Some("Invalid DPoP key binding, try again")
        );
        assert!(!challenge.is_nonce_required());
    }

    #[test]
    fn test_parse_unquoted_values() {
        let header = "DPoP error=use_dpop_nonce, error_description=nonce_needed";
        let challenge = DPoPChallenge::from_www_authenticate(header).unwrap();

        assert_eq!(challenge.error_code, "use_dpop_nonce");
        assert_eq!(challenge.error_description.as_deref(), Some("nonce_needed"));
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        assert!(DPoPChallenge::from_www_authenticate(r#"dpop error="use_dpop_nonce""#).is_some());
    }

    #[test]
    fn test_non_dpop_scheme_is_ignored() {
        assert!(DPoPChallenge::from_www_authenticate(r#"Bearer error="invalid_token""#).is_none());
    }

    #[test]
    fn test_missing_error_is_ignored() {
        assert!(DPoPChallenge::from_www_authenticate(r#"DPoP algs="ES256""#).is_none());
    }

    #[test]
    fn test_description_does_not_shadow_error() {
        let header = r#"DPoP error_description="first", error="use_dpop_nonce""#;
        let challenge = DPoPChallenge::from_www_authenticate(header).unwrap();

        assert_eq!(challenge.error_code, "use_dpop_nonce");
        assert_eq!(challenge.error_description.as_deref(), Some("first"));
    }
}
