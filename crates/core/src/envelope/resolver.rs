//! Key resolver - stored record to usable data key

use std::sync::Arc;

use keystore_domain::{KeyRecord, KeyVaultError, ResolvedKey, Result, Scope};
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

use crate::crypto::MasterKeyProvider;
use crate::storage::KeyRecordStore;

/// Turns a scope into its unwrapped data key, creating the key on first use.
#[derive(Clone)]
pub struct KeyResolver {
    store: Arc<KeyRecordStore>,
    master: Arc<dyn MasterKeyProvider>,
}

impl KeyResolver {
    /// Resolver over `store`, wrapping new keys with `master`
    pub fn new(store: Arc<KeyRecordStore>, master: Arc<dyn MasterKeyProvider>) -> Self {
        Self { store, master }
    }

    /// Record store keys are read from and written to
    pub fn store(&self) -> &Arc<KeyRecordStore> {
        &self.store
    }

    /// Resolve the key for `scope`, generating and storing one if absent.
    ///
    /// Two callers racing on a fresh scope both reach the insert; the loser
    /// gets a conflict and re-reads once, so both end up with the winner's
    /// key.
    ///
    /// # Errors
    /// Store errors propagate unchanged. Unwrap failures surface as
    /// [`KeyVaultError::KeyResolution`].
    #[instrument(skip_all, fields(scope = %scope))]
    pub fn resolve(&self, scope: Scope) -> Result<ResolvedKey> {
        let record = self.ensure_record(scope)?;
        self.unwrap_record(scope, &record)
    }

    /// Resolve without ever creating a key.
    ///
    /// # Errors
    /// [`KeyVaultError::KeyNotFound`] if the scope has no key yet.
    #[instrument(skip_all, fields(scope = %scope))]
    pub fn resolve_existing(&self, scope: Scope) -> Result<ResolvedKey> {
        let record = self.store.get(scope)?.ok_or(KeyVaultError::KeyNotFound { scope })?;
        self.unwrap_record(scope, &record)
    }

    /// Make sure `scope` has a stored key, without unwrapping it.
    #[instrument(skip_all, fields(scope = %scope))]
    pub fn ensure_key(&self, scope: Scope) -> Result<()> {
        self.ensure_record(scope).map(|_| ())
    }

    fn ensure_record(&self, scope: Scope) -> Result<KeyRecord> {
        if let Some(record) = self.store.get(scope)? {
            return Ok(record);
        }

        let record = self.master.generate_keyset(scope)?;
        match self.store.add(&record) {
            Ok(()) => {
                info!(row_key = %record.row_key, "created data key");
                Ok(record)
            }
            Err(KeyVaultError::RecordConflict { row_key }) => {
                warn!(%row_key, "lost key creation race, re-reading winner");
                self.store
                    .get(scope)?
                    .ok_or_else(|| KeyVaultError::key_resolution(scope, KeyVaultError::KeyNotFound { scope }))
            }
            Err(err) => Err(err),
        }
    }

    fn unwrap_record(&self, scope: Scope, record: &KeyRecord) -> Result<ResolvedKey> {
        let key = Zeroizing::new(
            self.master.unwrap(&record.wrapped_key).map_err(|e| KeyVaultError::key_resolution(scope, e))?,
        );
        let iv = Zeroizing::new(
            self.master.unwrap(&record.wrapped_iv).map_err(|e| KeyVaultError::key_resolution(scope, e))?,
        );

        let resolved = ResolvedKey::from_slices(&key, &iv).map_err(|e| KeyVaultError::key_resolution(scope, e))?;
        debug!(fingerprint = %record.fingerprint(), "data key unwrapped");
        Ok(resolved)
    }
}
