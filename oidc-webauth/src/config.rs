//! Client configuration

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::oidc::{IdTokenValidatorContext, KeySetSource, DEFAULT_LEEWAY_MS};
use crate::storage::{FileStorage, KeyringStorage, MemoryStorage, StorageKeyStore};

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// OIDC issuer URL, matched exactly against `iss`
    pub issuer: String,

    /// OIDC client ID
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Clock skew tolerance for `exp`, `iat` and `auth_time`
    #[serde(default = "default_leeway_ms")]
    pub leeway_ms: i64,

    /// Maximum authentication age
    #[serde(default)]
    pub max_age_ms: Option<i64>,

    /// Organization id (`org_...`) or name the user must belong to
    #[serde(default)]
    pub organization: Option<String>,

    /// Where the DPoP key lives
    #[serde(default)]
    pub dpop: DPoPConfig,
}

fn default_client_id() -> String {
    "oidc-webauth".to_string()
}

fn default_leeway_ms() -> i64 {
    DEFAULT_LEEWAY_MS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyStorageBackend {
    #[default]
    Keyring,
    File,
    Memory,
}

impl std::str::FromStr for KeyStorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keyring" => Ok(Self::Keyring),
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue {
                name: "OIDC_DPOP_STORAGE".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DPoPConfig {
    #[serde(default)]
    pub storage: KeyStorageBackend,

    /// Storage key name; defaults to the shared DPoP key name
    #[serde(default)]
    pub key_name: Option<String>,

    /// Directory for the file backend; defaults to the platform data dir
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let issuer = lookup("OIDC_ISSUER")
            .ok_or_else(|| ConfigError::MissingEnvVar("OIDC_ISSUER".to_string()))?;

        let client_id = lookup("OIDC_CLIENT_ID").unwrap_or_else(default_client_id);

        let leeway_ms = match lookup("OIDC_LEEWAY_MS") {
            Some(value) => parse_ms("OIDC_LEEWAY_MS", &value)?,
            None => DEFAULT_LEEWAY_MS,
        };

        let max_age_ms = lookup("OIDC_MAX_AGE_MS")
            .map(|value| parse_ms("OIDC_MAX_AGE_MS", &value))
            .transpose()?;

        let storage = lookup("OIDC_DPOP_STORAGE")
            .map(|value| value.parse::<KeyStorageBackend>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            issuer,
            client_id,
            leeway_ms,
            max_age_ms,
            organization: lookup("OIDC_ORGANIZATION"),
            dpop: DPoPConfig {
                storage,
                ..DPoPConfig::default()
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.check_durations()?;
        Ok(config)
    }

    fn check_durations(&self) -> Result<(), ConfigError> {
        non_negative("leeway_ms", self.leeway_ms)?;
        if let Some(max_age_ms) = self.max_age_ms {
            non_negative("max_age_ms", max_age_ms)?;
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("~/.config"));
        config_dir.join("oidc-webauth").join("config.yaml")
    }

    /// Load from default locations (file first, then env)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path();

        if config_path.exists() {
            Self::from_file(&config_path)
        } else {
            Self::from_env()
        }
    }

    /// Validation context for ID tokens from this issuer
    pub fn validator_context(&self, key_set: Arc<dyn KeySetSource>) -> IdTokenValidatorContext {
        let mut context = IdTokenValidatorContext::new(&self.issuer, &self.client_id, key_set)
            .with_leeway_ms(self.leeway_ms);

        if let Some(max_age_ms) = self.max_age_ms {
            context = context.with_max_age_ms(max_age_ms);
        }
        if let Some(organization) = &self.organization {
            context = context.with_organization(organization);
        }
        context
    }

    /// DPoP key store on the configured backend, creating the key on first use
    pub fn key_store(&self) -> Result<StorageKeyStore, ConfigError> {
        let store = match self.dpop.storage {
            KeyStorageBackend::Keyring => StorageKeyStore::new(KeyringStorage::new()),
            KeyStorageBackend::Memory => StorageKeyStore::new(MemoryStorage::new()),
            KeyStorageBackend::File => {
                let storage = match &self.dpop.directory {
                    Some(directory) => FileStorage::with_base_dir(directory),
                    None => FileStorage::new(),
                }
                .map_err(|e| ConfigError::Storage(e.to_string()))?;
                StorageKeyStore::new(storage)
            }
        };

        let store = match &self.dpop.key_name {
            Some(name) => store.with_key_name(name),
            None => store,
        };
        Ok(store.create_on_demand())
    }
}

fn parse_ms(name: &str, value: &str) -> Result<i64, ConfigError> {
    let ms = value
        .trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        })?;
    non_negative(name, ms)
}

fn non_negative(name: &str, ms: i64) -> Result<i64, ConfigError> {
    if ms < 0 {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: ms.to_string(),
        });
    }
    Ok(ms)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
    #[error("Key storage unavailable: {0}")]
    Storage(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
