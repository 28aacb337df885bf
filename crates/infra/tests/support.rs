//! Shared helpers for `keystore-infra` integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use keystore_domain::{CacheBackend, KeyVaultConfig, StoreBackend};
use tempfile::TempDir;

pub const PASSPHRASE: &str = "test";
pub const TABLE: &str = "VaultKeys";

pub const CERTIFICATE_BUNDLE: &[u8] =
    include_bytes!("../../core/tests/fixtures/test_certificate.pem");

/// Temporary directory holding the certificate bundle (and, for SQLite
/// configurations, the database file) for the duration of a test.
pub struct VaultFixture {
    pub dir: TempDir,
}

impl VaultFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir should be created");
        std::fs::write(dir.path().join("keystore.pem"), CERTIFICATE_BUNDLE)
            .expect("certificate should be written");
        Self { dir }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("keys.db")
    }

    /// Memory-backed configuration that provisions its table.
    pub fn memory_config(&self) -> KeyVaultConfig {
        let mut config = KeyVaultConfig::default();
        config.store.table_name = TABLE.to_owned();
        config.store.provision_table = true;
        config.certificate.directory = self.dir.path().to_path_buf();
        config.certificate.passphrase = PASSPHRASE.to_owned();
        config
    }

    /// SQLite-backed configuration using the moka cache.
    pub fn sqlite_config(&self) -> KeyVaultConfig {
        let mut config = self.memory_config();
        config.store.backend = StoreBackend::Sqlite { path: self.db_path(), pool_size: 2 };
        config.cache.backend = CacheBackend::Moka;
        config
    }
}
