//! Secret storage backends and the storage-backed DPoP key store.
//!
//! [`SecureStorage`] is a small key/value interface over wherever secrets
//! live: the OS keychain, owner-only files for headless hosts, or memory for
//! tests. [`StorageKeyStore`] keeps the DPoP private key in one of them.

pub mod file_store;
pub mod key_store;
pub mod keyring_store;
pub mod memory_store;

use thiserror::Error;

/// Key/value storage for secrets
pub trait SecureStorage: Send + Sync {
    /// Store a secret, replacing any previous value
    fn store(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Retrieve a secret
    fn retrieve(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Delete a secret; `NotFound` if there was none
    fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Check if a key exists
    fn exists(&self, key: &str) -> bool;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Key not found: {0}")]
    NotFound(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub use file_store::FileStorage;
pub use key_store::StorageKeyStore;
pub use keyring_store::KeyringStorage;
pub use memory_store::MemoryStorage;

/// Storage key for the DPoP private key
pub const KEY_DPOP_PRIVATE: &str = "oidc-webauth-dpop-key";
