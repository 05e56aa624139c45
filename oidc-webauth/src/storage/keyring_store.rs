//! OS keychain storage backend

use base64::{engine::general_purpose::STANDARD, Engine};
use keyring::Entry;

use crate::storage::{SecureStorage, StorageError};

const SERVICE_NAME: &str = "oidc-webauth";

/// Storage backend using OS keychain (Keychain on macOS, libsecret on Linux)
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Keep entries under a host-specific service name
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Entry::new(&self.service, key).map_err(|e| StorageError::Backend(e.to_string()))
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn map_keyring_error(key: &str, error: keyring::Error) -> StorageError {
    match error {
        keyring::Error::NoEntry => StorageError::NotFound(key.to_string()),
        keyring::Error::Ambiguous(_) => StorageError::Backend("Ambiguous entry".to_string()),
        other => StorageError::Backend(other.to_string()),
    }
}

impl SecureStorage for KeyringStorage {
    fn store(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        // keyring stores strings, so binary secrets are base64 encoded
        self.entry(key)?
            .set_password(&STANDARD.encode(value))
            .map_err(|e| map_keyring_error(key, e))
    }

    fn retrieve(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let encoded = self
            .entry(key)?
            .get_password()
            .map_err(|e| map_keyring_error(key, e))?;

        STANDARD
            .decode(&encoded)
            .map_err(|e| StorageError::Backend(format!("Base64 decode error: {}", e)))
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entry(key)?
            .delete_password()
            .map_err(|e| map_keyring_error(key, e))
    }

    fn exists(&self, key: &str) -> bool {
        self.retrieve(key).is_ok()
    }
}
