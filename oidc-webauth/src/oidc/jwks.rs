//! JWKS (JSON Web Key Set) sources and caching.
//!
//! This module handles:
//! - Key lookup by kid (key ID), ignoring keys not meant for signatures
//! - A fixed key set for hosts that already hold the issuer's JWKS
//! - A caching source with TTL and refresh-on-unknown-kid for key rotation
//!
//! Fetching is the host's job; [`CachedKeySet`] takes the fetch as a closure.
//! Lookups run inside the signature stage, off the caller's thread, so a
//! blocking fetch is acceptable there.

use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet, PublicKeyUse};
use parking_lot::RwLock;
use thiserror::Error;

/// Default cache TTL (5 minutes)
const DEFAULT_CACHE_TTL_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum JwksError {
    #[error("Failed to fetch JWKS: {0}")]
    JwksFetchError(String),

    #[error("Failed to parse JWKS: {0}")]
    JwksParseError(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("No keys in JWKS")]
    NoKeys,
}

/// Where the signature stage gets the issuer's public keys
pub trait KeySetSource: Send + Sync {
    /// The signing key with the given `kid`
    fn key(&self, kid: &str) -> Result<Jwk, JwksError>;
}

/// Find a signing key by kid. Keys whose `use` is anything but `sig` are
/// skipped; keys without `use` are accepted.
pub fn find_signing_key<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    jwks.keys.iter().find(|k| {
        k.common.key_id.as_deref() == Some(kid)
            && matches!(
                k.common.public_key_use,
                None | Some(PublicKeyUse::Signature)
            )
    })
}

/// Parse a JWKS document
pub fn parse_jwks(json: &str) -> Result<JwkSet, JwksError> {
    serde_json::from_str(json).map_err(|e| JwksError::JwksParseError(e.to_string()))
}

/// A key set that never changes
#[derive(Debug, Clone)]
pub struct StaticKeySet {
    jwks: JwkSet,
}

impl StaticKeySet {
    pub fn new(jwks: JwkSet) -> Self {
        Self { jwks }
    }

    pub fn from_json(json: &str) -> Result<Self, JwksError> {
        parse_jwks(json).map(Self::new)
    }
}

impl KeySetSource for StaticKeySet {
    fn key(&self, kid: &str) -> Result<Jwk, JwksError> {
        if self.jwks.keys.is_empty() {
            return Err(JwksError::NoKeys);
        }
        find_signing_key(&self.jwks, kid)
            .cloned()
            .ok_or_else(|| JwksError::KeyNotFound(kid.to_string()))
    }
}

type FetchJwks = dyn Fn() -> Result<JwkSet, JwksError> + Send + Sync;

/// Cached JWKS with TTL
struct CachedJwks {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// Key set that fetches through a host-supplied closure and caches the result
pub struct CachedKeySet {
    fetch: Box<FetchJwks>,
    cache: RwLock<Option<CachedJwks>>,
    cache_ttl: Duration,
}

impl CachedKeySet {
    /// Create a caching source around `fetch`
    pub fn new<F>(fetch: F) -> Self
    where
        F: Fn() -> Result<JwkSet, JwksError> + Send + Sync + 'static,
    {
        Self::with_cache_ttl(fetch, DEFAULT_CACHE_TTL_SECS)
    }

    /// Create with custom cache TTL
    pub fn with_cache_ttl<F>(fetch: F, ttl_secs: u64) -> Self
    where
        F: Fn() -> Result<JwkSet, JwksError> + Send + Sync + 'static,
    {
        Self {
            fetch: Box::new(fetch),
            cache: RwLock::new(None),
            cache_ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// Force refresh the JWKS cache
    pub fn refresh_jwks(&self) -> Result<(), JwksError> {
        let jwks = (self.fetch)()?;
        if jwks.keys.is_empty() {
            return Err(JwksError::NoKeys);
        }

        tracing::debug!(keys = jwks.keys.len(), "Refreshed JWKS cache");

        *self.cache.write() = Some(CachedJwks {
            jwks,
            fetched_at: Instant::now(),
        });

        Ok(())
    }

    fn get_key_from_cache(&self, kid: &str) -> Option<Jwk> {
        let cache = self.cache.read();

        match cache.as_ref() {
            Some(cached) if cached.fetched_at.elapsed() <= self.cache_ttl => {
                find_signing_key(&cached.jwks, kid).cloned()
            }
            _ => None,
        }
    }
}

impl KeySetSource for CachedKeySet {
    fn key(&self, kid: &str) -> Result<Jwk, JwksError> {
        // Try to get from cache first
        if let Some(jwk) = self.get_key_from_cache(kid) {
            return Ok(jwk);
        }

        // Cache miss, expiry or an unknown kid after rotation
        self.refresh_jwks()?;

        // The set was just fetched, so skip the TTL check
        self.cache
            .read()
            .as_ref()
            .and_then(|cached| find_signing_key(&cached.jwks, kid).cloned())
            .ok_or_else(|| JwksError::KeyNotFound(kid.to_string()))
    }
}
