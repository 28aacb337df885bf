//! Key record store - read-through cache over the key table

use std::fmt;
use std::sync::Arc;

use keystore_common::cache::{Expiration, ExpiringCache};
use keystore_domain::constants::KEY_PARTITION;
use keystore_domain::{validate_table_name, KeyRecord, KeyVaultError, Result, Scope};
use parking_lot::Mutex;
use tracing::{debug, instrument, trace, warn};

use super::ports::{TableEntity, TableError, TableService};

/// CRUD over key records in one table.
///
/// Reads go through the cache; only successful lookups are cached, never
/// absence or errors. Nothing is retried here.
///
/// Every eviction bumps a generation counter. A lookup that overlapped an
/// eviction returns its row but does not cache it.
pub struct KeyRecordStore {
    table: String,
    service: Arc<dyn TableService>,
    cache: Arc<dyn ExpiringCache<KeyRecord>>,
    expiration: Expiration,
    evictions: Mutex<u64>,
}

impl KeyRecordStore {
    /// Create a store for `table`, caching hits with the default sliding
    /// window.
    ///
    /// # Errors
    /// Returns [`KeyVaultError::Config`] if `table` is not a valid table name.
    pub fn new(
        table: impl Into<String>,
        service: Arc<dyn TableService>,
        cache: Arc<dyn ExpiringCache<KeyRecord>>,
    ) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self {
            table,
            service,
            cache,
            expiration: Expiration::default(),
            evictions: Mutex::new(0),
        })
    }

    /// Override the expiration applied to cached records
    #[must_use]
    pub fn with_expiration(mut self, expiration: Expiration) -> Self {
        self.expiration = expiration;
        self
    }

    /// Logical name of the key table
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Create the key table if it does not exist yet.
    #[instrument(skip_all, fields(table = %self.table))]
    pub fn ensure_table_exists(&self) -> Result<()> {
        self.service
            .create_table_if_not_exists(&self.table)
            .map_err(|e| self.map_table_error("create_table", e))?;
        debug!("key table ready");
        Ok(())
    }

    /// Drop the key table if it exists, forgetting every cached record.
    #[instrument(skip_all, fields(table = %self.table))]
    pub fn drop_table_if_exists(&self) -> Result<()> {
        let result = self.service.delete_table_if_exists(&self.table);
        self.evict(|cache| cache.clear());

        result.map_err(|e| self.map_table_error("delete_table", e))?;
        debug!("key table dropped");
        Ok(())
    }

    /// Fetch the record for `scope`.
    ///
    /// Returns `Ok(None)` when the table exists but holds no row for the
    /// scope.
    ///
    /// # Errors
    /// - [`KeyVaultError::StoreNotInitialized`] if the table does not exist
    /// - [`KeyVaultError::StoreAccess`] on transport failures or a row that
    ///   cannot be decoded
    #[instrument(skip_all, fields(table = %self.table, scope = %scope))]
    pub fn get(&self, scope: Scope) -> Result<Option<KeyRecord>> {
        let cache_key = scope.cache_key();
        if let Some(record) = self.cache.get(&cache_key) {
            trace!("key record cache hit");
            return Ok(Some(record));
        }
        let generation = *self.evictions.lock();

        // Existence first: the point lookup cannot distinguish a missing row
        // from a missing table.
        let table_exists =
            self.service.table_exists(&self.table).map_err(|e| self.map_table_error("table_exists", e))?;
        let entity = self
            .service
            .get_entity(&self.table, KEY_PARTITION, &scope.row_key())
            .map_err(|e| self.map_table_error("get", e))?;

        match entity {
            Some(entity) => {
                let record = KeyRecord::try_from(entity).map_err(|e| {
                    warn!(error = %e, "stored key record is corrupt");
                    KeyVaultError::store_access("decode", e.to_string(), false)
                })?;
                debug!(fingerprint = %record.fingerprint(), "key record loaded");
                let evictions = self.evictions.lock();
                if *evictions == generation {
                    self.cache.set(&cache_key, record.clone(), self.expiration);
                } else {
                    debug!("key record evicted during lookup, not caching");
                }
                drop(evictions);
                Ok(Some(record))
            }
            None if table_exists => {
                debug!("no key record for scope");
                Ok(None)
            }
            None => Err(KeyVaultError::StoreNotInitialized { table: self.table.clone() }),
        }
    }

    /// Insert a new record.
    ///
    /// # Errors
    /// - [`KeyVaultError::RecordConflict`] if the row already exists
    /// - [`KeyVaultError::StoreNotInitialized`] if the table does not exist
    #[instrument(skip_all, fields(table = %self.table, row_key = %record.row_key))]
    pub fn add(&self, record: &KeyRecord) -> Result<()> {
        self.service
            .insert_entity(&self.table, &TableEntity::from(record))
            .map_err(|e| self.map_table_error("insert", e))?;
        debug!(fingerprint = %record.fingerprint(), "key record stored");
        Ok(())
    }

    /// Delete a record and evict it from the cache.
    ///
    /// The cache entry is evicted whether or not the remote delete succeeds.
    #[instrument(skip_all, fields(table = %self.table, row_key = %record.row_key))]
    pub fn delete(&self, record: &KeyRecord) -> Result<()> {
        let result = self.service.delete_entity(&self.table, &record.partition_key, &record.row_key);
        self.evict(|cache| cache.remove(&record.scope().cache_key()));

        result.map_err(|e| self.map_table_error("delete", e))?;
        debug!("key record deleted");
        Ok(())
    }

    /// Apply `eviction` to the cache and start a new generation, so lookups
    /// already in flight do not re-cache what was just removed.
    fn evict(&self, eviction: impl FnOnce(&dyn ExpiringCache<KeyRecord>)) {
        let mut evictions = self.evictions.lock();
        *evictions = evictions.wrapping_add(1);
        eviction(self.cache.as_ref());
    }

    fn map_table_error(&self, operation: &'static str, err: TableError) -> KeyVaultError {
        match err {
            TableError::TableNotFound(_) => {
                KeyVaultError::StoreNotInitialized { table: self.table.clone() }
            }
            TableError::EntityAlreadyExists { row_key, .. } => KeyVaultError::RecordConflict { row_key },
            TableError::Transport(message) => {
                warn!(operation, error = %message, "key store transport failure");
                KeyVaultError::store_access(operation, message, true)
            }
            other => {
                warn!(operation, error = %other, "key store request rejected");
                KeyVaultError::store_access(operation, other.to_string(), false)
            }
        }
    }
}

impl fmt::Debug for KeyRecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRecordStore")
            .field("table", &self.table)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}
