//! DPoP key store persisted through a [`SecureStorage`] backend.

use std::sync::Arc;

use oidc_dpop::{DPoPError, DPoPKeyStore, DPoPPrivateKey, SoftwareKey};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::storage::{SecureStorage, StorageError, KEY_DPOP_PRIVATE};

/// Keeps the DPoP private key scalar in secret storage.
///
/// The key is loaded once and cached. With `create_on_demand`, a missing key
/// is generated and persisted on first use.
pub struct StorageKeyStore {
    storage: Box<dyn SecureStorage>,
    key_name: String,
    create_on_demand: bool,
    cached: Mutex<Option<Arc<SoftwareKey>>>,
}

impl StorageKeyStore {
    pub fn new(storage: impl SecureStorage + 'static) -> Self {
        Self::from_boxed(Box::new(storage))
    }

    pub fn from_boxed(storage: Box<dyn SecureStorage>) -> Self {
        Self {
            storage,
            key_name: KEY_DPOP_PRIVATE.to_string(),
            create_on_demand: false,
            cached: Mutex::new(None),
        }
    }

    /// Generate and persist a key when none is stored
    pub fn create_on_demand(mut self) -> Self {
        self.create_on_demand = true;
        self
    }

    /// Store the key under a different name (one key per account or tenant)
    pub fn with_key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = key_name.into();
        self
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }
}

fn backend_error(error: StorageError) -> DPoPError {
    DPoPError::unknown(error.to_string())
}

impl DPoPKeyStore for StorageKeyStore {
    fn has_private_key(&self) -> Result<bool, DPoPError> {
        if self.cached.lock().is_some() {
            return Ok(true);
        }
        Ok(self.storage.exists(&self.key_name))
    }

    fn private_key(&self) -> Result<Arc<dyn DPoPPrivateKey>, DPoPError> {
        // Held across load and creation so concurrent callers get one key
        let mut cached = self.cached.lock();

        if let Some(key) = cached.as_ref() {
            return Ok(key.clone());
        }

        let key = match self.storage.retrieve(&self.key_name) {
            Ok(bytes) => {
                debug!(key_name = %self.key_name, "Loaded DPoP key from storage");
                SoftwareKey::import_key(&bytes)?
            }
            Err(StorageError::NotFound(_)) if self.create_on_demand => {
                let key = SoftwareKey::generate();
                self.storage
                    .store(&self.key_name, &key.export_key())
                    .map_err(backend_error)?;
                info!(
                    key_name = %self.key_name,
                    thumbprint = %key.thumbprint(),
                    "Generated and stored new DPoP key"
                );
                key
            }
            Err(StorageError::NotFound(_)) => return Err(DPoPError::KeyUnavailable),
            Err(e) => return Err(backend_error(e)),
        };

        let key = Arc::new(key);
        *cached = Some(key.clone());
        Ok(key)
    }

    fn clear(&self) -> Result<(), DPoPError> {
        let mut cached = self.cached.lock();

        match self.storage.delete(&self.key_name) {
            Ok(()) | Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(backend_error(e)),
        }

        cached.take();
        info!(key_name = %self.key_name, "Removed DPoP key");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};
    use tempfile::TempDir;

    /// Backend whose every call fails, like a locked keychain
    struct LockedStorage;

    impl SecureStorage for LockedStorage {
        fn store(&self, _key: &str, _value: &[u8]) -> Result<(), StorageError> {
            Err(StorageError::Backend("locked".into()))
        }

        fn retrieve(&self, _key: &str) -> Result<Vec<u8>, StorageError> {
            Err(StorageError::Backend("locked".into()))
        }

        fn delete(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Backend("locked".into()))
        }

        fn exists(&self, _key: &str) -> bool {
            false
        }
    }

    #[test]
    fn test_missing_key_is_unavailable() {
        let store = StorageKeyStore::new(MemoryStorage::new());

        assert!(!store.has_private_key().unwrap());
        assert!(matches!(
            store.private_key(),
            Err(DPoPError::KeyUnavailable)
        ));
    }

    #[test]
    fn test_create_on_demand_persists() {
        let temp = TempDir::new().unwrap();
        let store =
            StorageKeyStore::new(FileStorage::with_base_dir(temp.path()).unwrap()).create_on_demand();

        let thumbprint = store.private_key().unwrap().thumbprint();
        assert!(store.has_private_key().unwrap());

        // A second store over the same directory loads the same key
        let reopened = StorageKeyStore::new(FileStorage::with_base_dir(temp.path()).unwrap());
        assert_eq!(reopened.private_key().unwrap().thumbprint(), thumbprint);
    }

    #[test]
    fn test_existing_key_is_loaded() {
        let storage = MemoryStorage::new();
        let key = SoftwareKey::generate();
        storage.store(KEY_DPOP_PRIVATE, &key.export_key()).unwrap();

        let store = StorageKeyStore::new(storage);

        assert!(store.has_private_key().unwrap());
        assert_eq!(store.private_key().unwrap().thumbprint(), key.thumbprint());
    }

    #[test]
    fn test_corrupt_key_is_invalid() {
        let storage = MemoryStorage::new();
        storage.store(KEY_DPOP_PRIVATE, b"not a scalar").unwrap();

        let store = StorageKeyStore::new(storage);

        assert!(matches!(store.private_key(), Err(DPoPError::InvalidKey)));
    }

    #[test]
    fn test_clear_removes_key() {
        let store = StorageKeyStore::new(MemoryStorage::new()).create_on_demand();
        let before = store.private_key().unwrap().thumbprint();

        store.clear().unwrap();
        assert!(!store.has_private_key().unwrap());

        // Clearing twice is fine
        store.clear().unwrap();

        let after = store.private_key().unwrap().thumbprint();
        assert_ne!(before, after);
    }

    #[test]
    fn test_key_names_are_independent() {
        let temp = TempDir::new().unwrap();
        let first = StorageKeyStore::new(FileStorage::with_base_dir(temp.path()).unwrap())
            .with_key_name("tenant-a")
            .create_on_demand();
        let second = StorageKeyStore::new(FileStorage::with_base_dir(temp.path()).unwrap())
            .with_key_name("tenant-b")
            .create_on_demand();

        assert_ne!(
            first.private_key().unwrap().thumbprint(),
            second.private_key().unwrap().thumbprint()
        );
    }

    #[test]
    fn test_backend_failures_are_reported() {
        let store = StorageKeyStore::new(LockedStorage).create_on_demand();

        assert!(matches!(store.private_key(), Err(DPoPError::Unknown(_))));
        assert!(matches!(store.clear(), Err(DPoPError::Unknown(_))));
    }
}
