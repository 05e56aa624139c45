//! File-based storage for headless environments

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::storage::{SecureStorage, StorageError};

/// One file per secret under a private directory.
///
/// WARNING: secrets sit on disk protected only by mode 0600.
/// Prefer KeyringStorage when available.
pub struct FileStorage {
    base_dir: PathBuf,
}

impl FileStorage {
    /// Storage in the platform's local data directory
    pub fn new() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("com", "oidc-webauth", "client").ok_or_else(|| {
            StorageError::Backend("Could not determine data directory".to_string())
        })?;

        Self::with_base_dir(dirs.data_local_dir())
    }

    /// Storage under `base_dir`, created owner-only if missing
    pub fn with_base_dir(base_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&base_dir, fs::Permissions::from_mode(0o700))?;
        }

        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        // Sanitize key name to prevent path traversal
        let safe_key = key.replace(['/', '\\', '.'], "_");
        self.base_dir.join(safe_key)
    }
}

impl SecureStorage for FileStorage {
    fn store(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.key_path(key);
        let staging = path.with_extension("tmp");

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        // Write then rename so a reader never sees a partial secret
        let mut file = options.open(&staging)?;
        file.write_all(value)?;
        file.sync_all()?;
        fs::rename(&staging, &path)?;

        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        match fs::read(self.key_path(key)) {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.key_path(key);

        let size = match fs::metadata(&path) {
            Ok(metadata) => metadata.len() as usize,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        // Overwrite with zeros before deleting (basic secure delete)
        if let Ok(mut file) = OpenOptions::new().write(true).open(&path) {
            let _ = file.write_all(&vec![0u8; size]);
            let _ = file.sync_all();
        }

        fs::remove_file(&path)?;
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        self.key_path(key).exists()
    }
}
