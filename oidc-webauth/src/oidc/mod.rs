//! OIDC ID token handling and validation.

pub mod claims;
pub mod jwks;
pub mod signature;
pub mod token;
pub mod validation;

pub use claims::{
    AudienceValidator, AuthTimeValidator, AuthorizedPartyValidator, ClaimValidator,
    ClaimsValidator, ExpiryValidator, IssuedAtValidator, IssuerValidator, NonceValidator,
    OrganizationValidator, SubjectValidator,
};
pub use jwks::{CachedKeySet, JwksError, KeySetSource, StaticKeySet};
pub use signature::{IdTokenSignatureValidator, SignatureValidator, SigningAlgorithm};
pub use token::{IdToken, IdTokenClaims, StringOrVec, TokenError, TokenHeader};
pub use validation::{
    validate_id_token, IdTokenValidator, IdTokenValidatorContext, ValidationError,
    DEFAULT_LEEWAY_MS,
};
