//! Key store capability and an in-memory implementation

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::DPoPError;
use crate::key::{DPoPPrivateKey, SoftwareKey};

/// Owner of the DPoP private key.
///
/// Backends (OS keychain, file, hardware token, test doubles) implement this
/// trait; nothing upstream depends on where the key lives.
pub trait DPoPKeyStore: Send + Sync {
    /// Whether a private key exists, without handing it out
    fn has_private_key(&self) -> Result<bool, DPoPError>;

    /// The private key, or `KeyUnavailable` if the backend holds none
    fn private_key(&self) -> Result<Arc<dyn DPoPPrivateKey>, DPoPError>;

    /// Remove the key. Removing an absent key succeeds.
    fn clear(&self) -> Result<(), DPoPError>;
}

/// Key store holding a software key in process memory.
///
/// Used for tests and for hosts without a secure storage backend.
#[derive(Default)]
pub struct MemoryKeyStore {
    key: Mutex<Option<Arc<SoftwareKey>>>,
    create_on_demand: bool,
}

impl MemoryKeyStore {
    /// Create an empty store; `private_key()` fails until a key is set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that generates a key on first use
    pub fn create_on_demand() -> Self {
        Self {
            key: Mutex::new(None),
            create_on_demand: true,
        }
    }

    /// Create a store holding `key`
    pub fn with_key(key: SoftwareKey) -> Self {
        Self {
            key: Mutex::new(Some(Arc::new(key))),
            create_on_demand: false,
        }
    }
}

impl DPoPKeyStore for MemoryKeyStore {
    fn has_private_key(&self) -> Result<bool, DPoPError> {
        Ok(self.key.lock().is_some())
    }

    fn private_key(&self) -> Result<Arc<dyn DPoPPrivateKey>, DPoPError> {
        let mut slot = self.key.lock();

        if let Some(key) = slot.as_ref() {
            return Ok(key.clone());
        }

        if !self.create_on_demand {
            return Err(DPoPError::KeyUnavailable);
        }

        let key = Arc::new(SoftwareKey::generate());
        tracing::info!(thumbprint = %key.thumbprint(), "Generated in-memory DPoP key");
        *slot = Some(key.clone());
        Ok(key)
    }

    fn clear(&self) -> Result<(), DPoPError> {
        self.key.lock().take();
        Ok(())
    }
}
