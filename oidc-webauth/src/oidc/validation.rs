//! ID token validation pipeline.
//!
//! Stages run in a fixed order and the first failure wins:
//!
//! 1. decode the compact token and select the algorithm from `alg`
//! 2. verify the signature on tokio's blocking pool
//! 3. run the claim chain (iss, aud, azp, exp, iat, nonce, auth_time, org)
//!
//! When validation is tied to a [`TransactionStore`] generation, a signature
//! result that arrives after the flow was superseded is discarded.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::oidc::claims::ClaimsValidator;
use crate::oidc::jwks::{JwksError, KeySetSource};
use crate::oidc::signature::{IdTokenSignatureValidator, SignatureValidator, SigningAlgorithm};
use crate::oidc::token::{IdToken, IdTokenClaims, TokenError};
use crate::transaction::{Generation, TransactionStore};

/// Default clock skew tolerance for time-based claims
pub const DEFAULT_LEEWAY_MS: i64 = 60_000;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Token error: {0}")]
    Decode(#[from] TokenError),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("No public key for key id {kid:?}")]
    MissingPublicKey { kid: Option<String> },

    #[error("Key set unavailable: {0}")]
    KeySet(#[from] JwksError),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Missing required claim: {0}")]
    MissingClaim(&'static str),

    #[error("Invalid {claim}: expected {expected}, got {actual}")]
    ClaimMismatch {
        claim: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Token expired: exp {exp} is before now {now} minus leeway")]
    Expired { now: i64, exp: i64 },

    #[error("Nonce mismatch: expected {expected}, got {actual}")]
    NonceMismatch { expected: String, actual: String },

    #[error("Auth time too old: max age {max_age_ms}ms, actual age {age_ms}ms")]
    AuthTimeTooOld { max_age_ms: i64, age_ms: i64 },

    #[error("Organization mismatch in {claim}: expected {expected}, got {actual}")]
    OrganizationMismatch {
        claim: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Login transaction was superseded during validation")]
    Superseded,

    #[error("Signature worker failed: {0}")]
    Worker(String),
}

/// What an ID token is checked against
#[derive(Clone)]
pub struct IdTokenValidatorContext {
    /// Expected `iss`
    pub issuer: String,
    /// Client id; expected in `aud` and, for multi-audience tokens, `azp`
    pub audience: String,
    /// Resolves `kid` to the issuer's public key
    pub key_set: Arc<dyn KeySetSource>,
    pub leeway_ms: i64,
    /// Maximum authentication age; enables the `auth_time` check
    pub max_age_ms: Option<i64>,
    /// Nonce sent on the authorize request
    pub nonce: Option<String>,
    /// Organization id (`org_...`) or name
    pub organization: Option<String>,
    /// Client secret for legacy HS256-signed ID tokens
    pub hs256_secret: Option<Vec<u8>>,
}

impl IdTokenValidatorContext {
    pub fn new(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        key_set: Arc<dyn KeySetSource>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            key_set,
            leeway_ms: DEFAULT_LEEWAY_MS,
            max_age_ms: None,
            nonce: None,
            organization: None,
            hs256_secret: None,
        }
    }

    pub fn with_leeway_ms(mut self, leeway_ms: i64) -> Self {
        self.leeway_ms = leeway_ms;
        self
    }

    pub fn with_max_age_ms(mut self, max_age_ms: i64) -> Self {
        self.max_age_ms = Some(max_age_ms);
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Accept HS256 ID tokens signed with `secret`
    pub fn with_hs256_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.hs256_secret = Some(secret.into());
        self
    }

    pub fn allows_hs256(&self) -> bool {
        self.hs256_secret.is_some()
    }
}

impl std::fmt::Debug for IdTokenValidatorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdTokenValidatorContext")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway_ms", &self.leeway_ms)
            .field("max_age_ms", &self.max_age_ms)
            .field("nonce", &self.nonce)
            .field("organization", &self.organization)
            .field("hs256", &self.allows_hs256())
            .finish_non_exhaustive()
    }
}

/// Runs the decode, signature and claim stages for one context
pub struct IdTokenValidator {
    context: IdTokenValidatorContext,
    signature_validator: Arc<dyn SignatureValidator>,
    /// Replaces the context-derived chain (tests, custom checks)
    claims_validator: Option<Arc<ClaimsValidator>>,
}

impl IdTokenValidator {
    pub fn new(context: IdTokenValidatorContext) -> Self {
        let mut signature = IdTokenSignatureValidator::new(context.key_set.clone());
        if let Some(secret) = &context.hs256_secret {
            signature = signature.with_shared_secret(secret.clone());
        }

        Self {
            signature_validator: Arc::new(signature),
            claims_validator: None,
            context,
        }
    }

    /// Use a different signature stage
    pub fn with_signature_validator(mut self, validator: Arc<dyn SignatureValidator>) -> Self {
        self.signature_validator = validator;
        self
    }

    /// Use a fixed claim chain instead of the one built from the context
    pub fn with_claims_validator(mut self, validator: ClaimsValidator) -> Self {
        self.claims_validator = Some(Arc::new(validator));
        self
    }

    pub fn context(&self) -> &IdTokenValidatorContext {
        &self.context
    }

    /// Validate `id_token` and return its claims
    pub async fn validate(&self, id_token: &str) -> Result<IdTokenClaims, ValidationError> {
        self.run(id_token, None).await
    }

    /// Validate `id_token` for the flow that held `store` at `generation`.
    ///
    /// Fails with [`ValidationError::Superseded`] if the store moved on
    /// while the signature was being verified.
    pub async fn validate_for(
        &self,
        id_token: &str,
        store: &TransactionStore,
        generation: Generation,
    ) -> Result<IdTokenClaims, ValidationError> {
        self.run(id_token, Some((store, generation))).await
    }

    async fn run(
        &self,
        id_token: &str,
        guard: Option<(&TransactionStore, Generation)>,
    ) -> Result<IdTokenClaims, ValidationError> {
        // The algorithm is settled before the payload is parsed
        let header = IdToken::decode_header(id_token)?;
        let algorithm = SigningAlgorithm::select(&header.alg, self.context.allows_hs256())
            .map_err(|e| {
                warn!(alg = %header.alg, "Rejected ID token algorithm");
                e
            })?;

        let token = Arc::new(IdToken::decode(id_token)?);

        debug!(
            alg = %algorithm,
            kid = ?token.header().kid,
            "Verifying ID token signature"
        );

        let signature_validator = Arc::clone(&self.signature_validator);
        let worker_token = Arc::clone(&token);
        let signature_result = tokio::task::spawn_blocking(move || {
            signature_validator.validate(&worker_token, algorithm)
        })
        .await
        .map_err(|e| ValidationError::Worker(e.to_string()))?;

        if let Some((store, generation)) = guard {
            if !store.is_current(generation) {
                warn!(
                    started = generation.value(),
                    current = store.generation().value(),
                    "Discarding ID token result for a superseded transaction"
                );
                return Err(ValidationError::Superseded);
            }
        }

        if let Err(e) = signature_result {
            warn!(error = %e, "ID token signature rejected");
            return Err(e);
        }

        debug!("Checking ID token claims");

        let chain = match &self.claims_validator {
            Some(chain) => Arc::clone(chain),
            None => Arc::new(ClaimsValidator::for_context(&self.context, Utc::now())),
        };

        if let Err(e) = chain.validate(token.claims()) {
            warn!(error = %e, "ID token claims rejected");
            return Err(e);
        }

        debug!(sub = ?token.claims().sub, "ID token validated");

        Ok(token.claims().clone())
    }
}

/// Validate `id_token` against `context` with the default stages
pub async fn validate_id_token(
    id_token: &str,
    context: &IdTokenValidatorContext,
) -> Result<IdTokenClaims, ValidationError> {
    IdTokenValidator::new(context.clone())
        .validate(id_token)
        .await
}
