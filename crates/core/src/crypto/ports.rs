//! Port interface for the master key

use chrono::Utc;
use keystore_domain::constants::{AES_IV_LEN, AES_KEY_LEN};
use keystore_domain::{KeyRecord, Result, Scope};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

/// Asymmetric key that protects data keys at rest.
///
/// Implementations are immutable after construction and shared across
/// threads.
pub trait MasterKeyProvider: Send + Sync {
    /// Encrypt a small payload with the public component.
    fn wrap(&self, plain: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt a wrapped payload with the private component.
    fn unwrap(&self, wrapped: &[u8]) -> Result<Vec<u8>>;

    /// Whether [`MasterKeyProvider::unwrap`] can succeed at all.
    fn has_private_key(&self) -> bool;

    /// Fresh random AES-256 key and IV for `scope`, both wrapped.
    ///
    /// The record is not persisted.
    fn generate_keyset(&self, scope: Scope) -> Result<KeyRecord> {
        let mut key = Zeroizing::new([0_u8; AES_KEY_LEN]);
        let mut iv = Zeroizing::new([0_u8; AES_IV_LEN]);
        OsRng.fill_bytes(key.as_mut());
        OsRng.fill_bytes(iv.as_mut());

        let wrapped_key = self.wrap(key.as_ref())?;
        let wrapped_iv = self.wrap(iv.as_ref())?;
        Ok(KeyRecord::new(scope, wrapped_key, wrapped_iv, Utc::now()))
    }
}
