//! ID token claim checks.
//!
//! Each check is a [`ClaimValidator`]. [`ClaimsValidator`] runs an ordered
//! list of them and stops at the first failure, so later checks never see a
//! token an earlier one rejected.

use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;

use crate::oidc::token::IdTokenClaims;
use crate::oidc::validation::{IdTokenValidatorContext, ValidationError};

/// Organization ids carry this prefix; anything else is an organization name
pub const ORGANIZATION_ID_PREFIX: &str = "org_";

/// A single claim check
pub trait ClaimValidator: Send + Sync {
    fn validate(&self, claims: &IdTokenClaims) -> Result<(), ValidationError>;
}

impl<F> ClaimValidator for F
where
    F: Fn(&IdTokenClaims) -> Result<(), ValidationError> + Send + Sync,
{
    fn validate(&self, claims: &IdTokenClaims) -> Result<(), ValidationError> {
        self(claims)
    }
}

/// Ordered, fail-fast chain of claim checks
pub struct ClaimsValidator {
    validators: Vec<Box<dyn ClaimValidator>>,
}

impl ClaimsValidator {
    pub fn new(validators: Vec<Box<dyn ClaimValidator>>) -> Self {
        Self { validators }
    }

    /// The standard chain for `context`, evaluated against `base_time`:
    /// iss, sub, aud, azp, exp, iat, then nonce, auth_time and organization when
    /// the context asks for them.
    pub fn for_context(context: &IdTokenValidatorContext, base_time: DateTime<Utc>) -> Self {
        let mut validators: Vec<Box<dyn ClaimValidator>> = vec![
            Box::new(IssuerValidator::new(&context.issuer)),
            Box::new(SubjectValidator),
            Box::new(AudienceValidator::new(&context.audience)),
            Box::new(AuthorizedPartyValidator::new(&context.audience)),
            Box::new(ExpiryValidator::new(base_time, context.leeway_ms)),
            Box::new(IssuedAtValidator::new(base_time, context.leeway_ms)),
        ];

        if let Some(nonce) = &context.nonce {
            validators.push(Box::new(NonceValidator::new(nonce)));
        }
        if let Some(max_age_ms) = context.max_age_ms {
            validators.push(Box::new(AuthTimeValidator::new(
                base_time,
                context.leeway_ms,
                max_age_ms,
            )));
        }
        if let Some(organization) = &context.organization {
            validators.push(Box::new(OrganizationValidator::new(organization)));
        }

        Self::new(validators)
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Run every check in order, returning the first failure
    pub fn validate(&self, claims: &IdTokenClaims) -> Result<(), ValidationError> {
        for validator in &self.validators {
            validator.validate(claims)?;
        }
        Ok(())
    }
}

/// `iss` must equal the expected issuer exactly
pub struct IssuerValidator {
    expected: String,
}

impl IssuerValidator {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl ClaimValidator for IssuerValidator {
    fn validate(&self, claims: &IdTokenClaims) -> Result<(), ValidationError> {
        let actual = claims
            .iss
            .as_deref()
            .ok_or(ValidationError::MissingClaim("iss"))?;

        if actual != self.expected {
            return Err(ValidationError::ClaimMismatch {
                claim: "iss",
                expected: self.expected.clone(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}

/// `sub` must be present and non-empty
pub struct SubjectValidator;

impl ClaimValidator for SubjectValidator {
    fn validate(&self, claims: &IdTokenClaims) -> Result<(), ValidationError> {
        match claims.sub.as_deref() {
            Some(sub) if !sub.is_empty() => Ok(()),
            _ => Err(ValidationError::MissingClaim("sub")),
        }
    }
}

/// `aud` must be, or contain, the client id
pub struct AudienceValidator {
    expected: String,
}

impl AudienceValidator {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl ClaimValidator for AudienceValidator {
    fn validate(&self, claims: &IdTokenClaims) -> Result<(), ValidationError> {
        let aud = match &claims.aud {
            Some(aud) if !aud.is_empty() => aud,
            _ => return Err(ValidationError::MissingClaim("aud")),
        };

        if !aud.contains(&self.expected) {
            return Err(ValidationError::ClaimMismatch {
                claim: "aud",
                expected: self.expected.clone(),
                actual: aud.joined(),
            });
        }
        Ok(())
    }
}

/// With more than one audience, `azp` must be present and name the client.
/// Single-audience tokens pass untouched.
pub struct AuthorizedPartyValidator {
    expected: String,
}

impl AuthorizedPartyValidator {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl ClaimValidator for AuthorizedPartyValidator {
    fn validate(&self, claims: &IdTokenClaims) -> Result<(), ValidationError> {
        let multiple_audiences = claims.aud.as_ref().map_or(false, |aud| aud.len() > 1);
        if !multiple_audiences {
            return Ok(());
        }

        let azp = claims
            .azp
            .as_deref()
            .ok_or(ValidationError::MissingClaim("azp"))?;

        if azp != self.expected {
            return Err(ValidationError::ClaimMismatch {
                claim: "azp",
                expected: self.expected.clone(),
                actual: azp.to_string(),
            });
        }
        Ok(())
    }
}

/// Valid while `now - leeway <= exp`
pub struct ExpiryValidator {
    base_time: DateTime<Utc>,
    leeway_ms: i64,
}

impl ExpiryValidator {
    pub fn new(base_time: DateTime<Utc>, leeway_ms: i64) -> Self {
        Self {
            base_time,
            leeway_ms,
        }
    }
}

impl ClaimValidator for ExpiryValidator {
    fn validate(&self, claims: &IdTokenClaims) -> Result<(), ValidationError> {
        let exp = claims.exp.ok_or(ValidationError::MissingClaim("exp"))?;

        let now_ms = self.base_time.timestamp_millis();
        if now_ms.saturating_sub(self.leeway_ms) > exp.saturating_mul(1000) {
            return Err(ValidationError::Expired {
                now: self.base_time.timestamp(),
                exp,
            });
        }
        Ok(())
    }
}

/// `iat` must be present and not later than `now + leeway`
pub struct IssuedAtValidator {
    base_time: DateTime<Utc>,
    leeway_ms: i64,
}

impl IssuedAtValidator {
    pub fn new(base_time: DateTime<Utc>, leeway_ms: i64) -> Self {
        Self {
            base_time,
            leeway_ms,
        }
    }
}

impl ClaimValidator for IssuedAtValidator {
    fn validate(&self, claims: &IdTokenClaims) -> Result<(), ValidationError> {
        let iat = claims.iat.ok_or(ValidationError::MissingClaim("iat"))?;

        let latest_ms = self
            .base_time
            .timestamp_millis()
            .saturating_add(self.leeway_ms);
        if iat.saturating_mul(1000) > latest_ms {
            return Err(ValidationError::ClaimMismatch {
                claim: "iat",
                expected: format!("<= {}", latest_ms / 1000),
                actual: iat.to_string(),
            });
        }
        Ok(())
    }
}

/// `nonce` must equal the value sent on the authorize request
pub struct NonceValidator {
    expected: String,
}

impl NonceValidator {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl ClaimValidator for NonceValidator {
    fn validate(&self, claims: &IdTokenClaims) -> Result<(), ValidationError> {
        let actual = claims
            .nonce
            .as_deref()
            .ok_or(ValidationError::MissingClaim("nonce"))?;

        if !bool::from(actual.as_bytes().ct_eq(self.expected.as_bytes())) {
            return Err(ValidationError::NonceMismatch {
                expected: self.expected.clone(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}

/// With a max age, `auth_time` must be present and
/// `now - auth_time <= max_age + leeway`
pub struct AuthTimeValidator {
    base_time: DateTime<Utc>,
    leeway_ms: i64,
    max_age_ms: i64,
}

impl AuthTimeValidator {
    pub fn new(base_time: DateTime<Utc>, leeway_ms: i64, max_age_ms: i64) -> Self {
        Self {
            base_time,
            leeway_ms,
            max_age_ms,
        }
    }
}

impl ClaimValidator for AuthTimeValidator {
    fn validate(&self, claims: &IdTokenClaims) -> Result<(), ValidationError> {
        let auth_time = claims
            .auth_time
            .ok_or(ValidationError::MissingClaim("auth_time"))?;

        let age_ms = self
            .base_time
            .timestamp_millis()
            .saturating_sub(auth_time.saturating_mul(1000));
        if age_ms > self.max_age_ms.saturating_add(self.leeway_ms) {
            return Err(ValidationError::AuthTimeTooOld {
                max_age_ms: self.max_age_ms,
                age_ms,
            });
        }
        Ok(())
    }
}

/// Organization check. Ids (`org_...`) compare exactly with `org_id`; names
/// compare case-insensitively with `org_name`.
pub struct OrganizationValidator {
    expected: String,
}

impl OrganizationValidator {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl ClaimValidator for OrganizationValidator {
    fn validate(&self, claims: &IdTokenClaims) -> Result<(), ValidationError> {
        if self.expected.starts_with(ORGANIZATION_ID_PREFIX) {
            let actual = claims
                .org_id
                .as_deref()
                .ok_or(ValidationError::MissingClaim("org_id"))?;

            if actual != self.expected {
                return Err(ValidationError::OrganizationMismatch {
                    claim: "org_id",
                    expected: self.expected.clone(),
                    actual: actual.to_string(),
                });
            }
        } else {
            let actual = claims
                .org_name
                .as_deref()
                .ok_or(ValidationError::MissingClaim("org_name"))?;

            if actual.to_lowercase() != self.expected.to_lowercase() {
                return Err(ValidationError::OrganizationMismatch {
                    claim: "org_name",
                    expected: self.expected.clone(),
                    actual: actual.to_string(),
                });
            }
        }
        Ok(())
    }
}
