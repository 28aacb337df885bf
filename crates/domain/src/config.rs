//! Keystore configuration structures
//!
//! Plain serde types; loading from the environment or from TOML/JSON files
//! lives in `keystore-infra::config`.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_CERTIFICATE_FILE, DEFAULT_SLIDING_WINDOW_SECS,
    DEFAULT_SQLITE_POOL_SIZE, DEFAULT_TABLE_NAME, MAX_SLIDING_WINDOW_SECS,
};
use crate::errors::{KeyVaultError, Result};
use crate::impl_keyword_conversions;
use crate::types::validate_table_name;

/// Top-level keystore configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyVaultConfig {
    /// Key table settings
    pub store: StoreConfig,
    /// Master key bundle settings
    pub certificate: CertificateConfig,
    /// Record cache settings
    pub cache: CacheConfig,
    /// Scope whose key is ensured at startup; `None` means global
    pub default_scope: Option<Uuid>,
}

impl KeyVaultConfig {
    /// Reject settings no backend could honor.
    pub fn validate(&self) -> Result<()> {
        validate_table_name(&self.store.table_name)?;

        if let StoreBackend::Sqlite { path, pool_size } = &self.store.backend {
            if path.as_os_str().is_empty() {
                return Err(KeyVaultError::Config("sqlite backend requires a path".into()));
            }
            if *pool_size == 0 {
                return Err(KeyVaultError::Config("sqlite pool_size must be at least 1".into()));
            }
        }

        if self.certificate.file_name.trim().is_empty() {
            return Err(KeyVaultError::Config("certificate file_name must not be empty".into()));
        }
        if self.cache.sliding_window_secs == 0 {
            return Err(KeyVaultError::Config("cache sliding_window_secs must be positive".into()));
        }
        if self.cache.sliding_window_secs > MAX_SLIDING_WINDOW_SECS {
            return Err(KeyVaultError::Config(format!(
                "cache sliding_window_secs must not exceed {MAX_SLIDING_WINDOW_SECS}"
            )));
        }
        if self.cache.max_capacity == 0 {
            return Err(KeyVaultError::Config("cache max_capacity must be positive".into()));
        }

        Ok(())
    }
}

/// Where key records are persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Logical key table name
    pub table_name: String,
    /// Table service implementation
    pub backend: StoreBackend,
    /// Create the table at startup if it is missing
    pub provision_table: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_owned(),
            backend: StoreBackend::default(),
            provision_table: false,
        }
    }
}

/// Table service implementation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local tables, lost on exit
    #[default]
    Memory,
    /// SQLite database file with a connection pool
    Sqlite {
        path: PathBuf,
        #[serde(default = "default_pool_size")]
        pool_size: u32,
    },
}

impl StoreBackend {
    /// Keyword naming this backend
    pub fn kind(&self) -> StoreBackendKind {
        match self {
            Self::Memory => StoreBackendKind::Memory,
            Self::Sqlite { .. } => StoreBackendKind::Sqlite,
        }
    }
}

fn default_pool_size() -> u32 {
    DEFAULT_SQLITE_POOL_SIZE
}

/// Bare keyword selecting a [`StoreBackend`], as read from the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreBackendKind {
    /// Selects [`StoreBackend::Memory`]
    Memory,
    /// Selects [`StoreBackend::Sqlite`]
    Sqlite,
}

impl_keyword_conversions!(StoreBackendKind {
    Memory => "memory",
    Sqlite => "sqlite",
});

/// Location and passphrase of the master key bundle
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateConfig {
    /// Directory holding the bundle
    pub directory: PathBuf,
    /// Bundle file name within `directory`
    pub file_name: String,
    /// Passphrase of the encrypted private key
    pub passphrase: String,
}

impl CertificateConfig {
    /// `directory/file_name`
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            file_name: DEFAULT_CERTIFICATE_FILE.to_owned(),
            passphrase: String::new(),
        }
    }
}

impl fmt::Debug for CertificateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateConfig")
            .field("directory", &self.directory)
            .field("file_name", &self.file_name)
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

/// Cache backend selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Clock-driven `HashMap` cache
    #[default]
    Memory,
    /// Bounded `moka` cache
    Moka,
}

impl_keyword_conversions!(CacheBackend {
    Memory => "memory",
    Moka => "moka",
});

/// Record cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache implementation
    pub backend: CacheBackend,
    /// Idle window after which a cached record expires
    pub sliding_window_secs: u64,
    /// Only honored by the moka backend
    pub max_capacity: u64,
}

impl CacheConfig {
    /// `sliding_window_secs` as a `Duration`
    pub fn sliding_window(&self) -> Duration {
        Duration::from_secs(self.sliding_window_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            sliding_window_secs: DEFAULT_SLIDING_WINDOW_SECS,
            max_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for config.
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = KeyVaultConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.store.table_name, "KeyStore");
        assert_eq!(config.cache.sliding_window(), Duration::from_secs(10_800));
        assert!(!config.store.provision_table);
        assert!(config.default_scope.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = KeyVaultConfig::default();
        config.store.table_name = "bad_name".into();
        assert!(matches!(config.validate(), Err(KeyVaultError::Config(_))));

        let mut config = KeyVaultConfig::default();
        config.store.backend = StoreBackend::Sqlite { path: PathBuf::from("keys.db"), pool_size: 0 };
        assert!(config.validate().is_err());

        let mut config = KeyVaultConfig::default();
        config.cache.sliding_window_secs = 0;
        assert!(config.validate().is_err());

        let mut config = KeyVaultConfig::default();
        config.cache.sliding_window_secs = u64::MAX;
        assert!(matches!(config.validate(), Err(KeyVaultError::Config(ref msg)) if msg.contains("exceed")));
        config.cache.sliding_window_secs = MAX_SLIDING_WINDOW_SECS;
        assert!(config.validate().is_ok());

        let mut config = KeyVaultConfig::default();
        config.certificate.file_name = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_passphrase_redacted_in_debug() {
        let config = CertificateConfig { passphrase: "hunter2".into(), ..Default::default() };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }

    /// Validates the TOML shape accepted for a SQLite-backed store.
    #[test]
    fn test_deserialize_sqlite_backend_from_toml() {
        let raw = r#"
            default_scope = "6f1c2b4a-8d3e-4f5a-9b7c-0d1e2f3a4b5c"

            [store]
            table_name = "Keys"
            provision_table = true
            backend = { kind = "sqlite", path = "/var/lib/keystore/keys.db" }

            [cache]
            backend = "moka"
            sliding_window_secs = 60
        "#;

        let config: KeyVaultConfig = toml::from_str(raw).unwrap();
        assert_eq!(
            config.store.backend,
            StoreBackend::Sqlite { path: PathBuf::from("/var/lib/keystore/keys.db"), pool_size: 4 }
        );
        assert!(config.store.provision_table);
        assert_eq!(config.cache.backend, CacheBackend::Moka);
        assert_eq!(config.cache.max_capacity, 10_000);
        assert_eq!(config.certificate.file_name, "keystore.pem");
        assert!(config.default_scope.is_some());
    }

    #[test]
    fn test_cache_backend_keywords() {
        assert_eq!("MOKA".parse::<CacheBackend>(), Ok(CacheBackend::Moka));
        assert_eq!(CacheBackend::Memory.to_string(), "memory");
        assert!("redis".parse::<CacheBackend>().is_err());
    }

    #[test]
    fn test_store_backend_keywords() {
        assert_eq!(" SQLite".parse::<StoreBackendKind>(), Ok(StoreBackendKind::Sqlite));
        assert_eq!(StoreBackend::Memory.kind().to_string(), "memory");
        let sqlite = StoreBackend::Sqlite { path: PathBuf::from("k.db"), pool_size: 1 };
        assert_eq!(sqlite.kind(), StoreBackendKind::Sqlite);
        assert!("postgres".parse::<StoreBackendKind>().is_err());
    }
}
