//! Fully wired keystore
//!
//! [`KeyVault`] builds every layer from a [`KeyVaultConfig`]: master key
//! from the certificate bundle on disk, record cache, table backend, key
//! record store, resolver and envelope engine.

use std::fmt;
use std::sync::Arc;

use keystore_common::cache::{Expiration, ExpiringCache, MemoryCache, MokaCache};
use keystore_core::{
    EnvelopeCrypto, KeyRecordStore, KeyResolver, RsaMasterKey, TableError, TableService,
};
use keystore_domain::{
    CacheBackend, KeyRecord, KeyVaultConfig, KeyVaultError, Result, Scope, StoreBackend,
};
use tracing::{info, instrument};

use crate::tables::{MemoryTableService, SqliteTableService};

/// Envelope encryption over a configured key table
///
/// Cloning is cheap; clones share the store, cache and master key.
#[derive(Clone)]
pub struct KeyVault {
    store: Arc<KeyRecordStore>,
    engine: EnvelopeCrypto,
    default_scope: Scope,
}

impl KeyVault {
    /// Build the keystore described by `config`.
    ///
    /// Steps, in order: validate the configuration, load the master key from
    /// `certificate.directory/certificate.file_name`, open the table backend,
    /// create the table when `store.provision_table` is set, and make sure the
    /// default scope has a key.
    ///
    /// # Errors
    /// - [`KeyVaultError::Config`] for invalid settings
    /// - [`KeyVaultError::KeyLoad`] if the bundle cannot be read or decrypted
    /// - [`KeyVaultError::StoreAccess`] if the backend cannot be opened
    /// - [`KeyVaultError::StoreNotInitialized`] if the table is missing and
    ///   provisioning is off
    #[instrument(skip_all, fields(table = %config.store.table_name))]
    pub fn from_config(config: &KeyVaultConfig) -> Result<Self> {
        config.validate()?;
        let service = open_table_service(&config.store.backend)?;
        Self::with_table_service(config, service)
    }

    /// Like [`KeyVault::from_config`], over an already constructed table
    /// service. `store.backend` is ignored.
    pub fn with_table_service(
        config: &KeyVaultConfig,
        service: Arc<dyn TableService>,
    ) -> Result<Self> {
        let master = load_master_key(config)?;

        let cache: Arc<dyn ExpiringCache<KeyRecord>> = match config.cache.backend {
            CacheBackend::Memory => Arc::new(MemoryCache::new()),
            CacheBackend::Moka => Arc::new(MokaCache::new(config.cache.max_capacity)),
        };

        let store = Arc::new(
            KeyRecordStore::new(config.store.table_name.clone(), service, cache)?
                .with_expiration(Expiration::Sliding(config.cache.sliding_window())),
        );
        if config.store.provision_table {
            store.ensure_table_exists()?;
        }

        let engine = EnvelopeCrypto::new(KeyResolver::new(Arc::clone(&store), Arc::new(master)));
        let default_scope = Scope::from(config.default_scope);
        engine.ensure_key(default_scope)?;

        info!(
            cache = %config.cache.backend,
            default_scope = %default_scope,
            "key vault ready"
        );
        Ok(Self { store, engine, default_scope })
    }

    /// Key record store behind the vault
    pub fn store(&self) -> &Arc<KeyRecordStore> {
        &self.store
    }

    /// Envelope crypto engine behind the vault
    pub fn engine(&self) -> &EnvelopeCrypto {
        &self.engine
    }

    /// Scope whose key was ensured at startup.
    pub fn default_scope(&self) -> Scope {
        self.default_scope
    }

    /// Encrypt `plain` under `scope`'s key, creating the key if needed.
    pub fn encrypt_bytes(&self, scope: Scope, plain: &[u8]) -> Result<Vec<u8>> {
        self.engine.encrypt_bytes(scope, plain)
    }

    /// Decrypt `ciphertext` with `scope`'s key.
    pub fn decrypt_bytes(&self, scope: Scope, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.engine.decrypt_bytes(scope, ciphertext)
    }

    /// UTF-8 text to padded standard base64.
    pub fn encrypt_text(&self, scope: Scope, text: &str) -> Result<String> {
        self.engine.encrypt_text(scope, text)
    }

    /// Base64 ciphertext back to UTF-8 text.
    pub fn decrypt_text(&self, scope: Scope, encoded: &str) -> Result<String> {
        self.engine.decrypt_text(scope, encoded)
    }

    /// Create the key for `scope` if it does not exist yet.
    pub fn ensure_key(&self, scope: Scope) -> Result<()> {
        self.engine.ensure_key(scope)
    }
}

impl fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyVault")
            .field("table", &self.store.table_name())
            .field("default_scope", &self.default_scope)
            .finish_non_exhaustive()
    }
}

fn open_table_service(backend: &StoreBackend) -> Result<Arc<dyn TableService>> {
    match backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryTableService::new())),
        StoreBackend::Sqlite { path, pool_size } => SqliteTableService::open(path, *pool_size)
            .map(|service| Arc::new(service) as Arc<dyn TableService>)
            .map_err(|e: TableError| KeyVaultError::store_access("open", e.to_string(), false)),
    }
}

fn load_master_key(config: &KeyVaultConfig) -> Result<RsaMasterKey> {
    let path = config.certificate.path();
    let bundle = std::fs::read(&path).map_err(|e| {
        KeyVaultError::KeyLoad(format!("cannot read certificate {}: {e}", path.display()))
    })?;
    RsaMasterKey::load(&bundle, &config.certificate.passphrase)
}
