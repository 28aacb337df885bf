//! Wrapped and unwrapped data keys

use std::fmt;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::Scope;
use crate::constants::{AES_IV_LEN, AES_KEY_LEN, KEY_PARTITION};
use crate::errors::{KeyVaultError, Result};

/// Persisted form of one scope's data key.
///
/// `wrapped_key` and `wrapped_iv` are ciphertext under the master key; the
/// plaintext never appears in a record. `etag` is owned by the store and is
/// `None` until the record has been read back.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyRecord {
    /// Always the key partition
    pub partition_key: String,
    /// Scope token (32 hex digits)
    pub row_key: String,
    /// Owning principal; `None` for the global scope
    pub scope: Option<Uuid>,
    /// AES key wrapped by the master key
    pub wrapped_key: Vec<u8>,
    /// IV wrapped by the master key
    pub wrapped_iv: Vec<u8>,
    /// When the key was generated
    pub created_at: DateTime<Utc>,
    /// Version tag assigned by the table service
    pub etag: Option<String>,
}

impl KeyRecord {
    /// Build a record addressed by `scope` in the key partition.
    pub fn new(scope: Scope, wrapped_key: Vec<u8>, wrapped_iv: Vec<u8>, created_at: DateTime<Utc>) -> Self {
        Self {
            partition_key: KEY_PARTITION.to_owned(),
            row_key: scope.row_key(),
            scope: scope.id(),
            wrapped_key,
            wrapped_iv,
            created_at,
            etag: None,
        }
    }

    /// Scope this record belongs to
    pub fn scope(&self) -> Scope {
        Scope::from(self.scope)
    }

    /// Short SHA-256 fingerprint of the wrapped key, safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.wrapped_key);
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRecord")
            .field("partition_key", &self.partition_key)
            .field("row_key", &self.row_key)
            .field("scope", &self.scope)
            .field("wrapped_key", &format_args!("[{} bytes]", self.wrapped_key.len()))
            .field("wrapped_iv", &format_args!("[{} bytes]", self.wrapped_iv.len()))
            .field("created_at", &self.created_at)
            .field("etag", &self.etag)
            .finish()
    }
}

/// Unwrapped AES-256 key and IV for one scope.
///
/// Lives only in process memory and is zeroed when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ResolvedKey {
    key: [u8; AES_KEY_LEN],
    iv: [u8; AES_IV_LEN],
}

impl ResolvedKey {
    /// Hold already-unwrapped key material
    pub fn new(key: [u8; AES_KEY_LEN], iv: [u8; AES_IV_LEN]) -> Self {
        Self { key, iv }
    }

    /// Build from unwrapped buffers, rejecting wrong lengths.
    pub fn from_slices(key: &[u8], iv: &[u8]) -> Result<Self> {
        let key: [u8; AES_KEY_LEN] = key.try_into().map_err(|_| {
            KeyVaultError::Decryption(format!(
                "unwrapped key is {} bytes, expected {AES_KEY_LEN}",
                key.len()
            ))
        })?;
        let iv: [u8; AES_IV_LEN] = iv.try_into().map_err(|_| {
            KeyVaultError::Decryption(format!(
                "unwrapped IV is {} bytes, expected {AES_IV_LEN}",
                iv.len()
            ))
        })?;
        Ok(Self { key, iv })
    }

    /// AES-256 key bytes
    pub fn key(&self) -> &[u8; AES_KEY_LEN] {
        &self.key
    }

    /// CBC initialization vector
    pub fn iv(&self) -> &[u8; AES_IV_LEN] {
        &self.iv
    }
}

impl fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedKey").field("key", &"[REDACTED]").field("iv", &"[REDACTED]").finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for types::key.
    use super::*;

    fn record(scope: Scope) -> KeyRecord {
        KeyRecord::new(scope, vec![0xAB; 256], vec![0xCD; 256], Utc::now())
    }

    #[test]
    fn test_new_record_addresses_scope() {
        let id = Uuid::new_v4();
        let rec = record(Scope::principal(id));

        assert_eq!(rec.partition_key, "SymmetricKey");
        assert_eq!(rec.row_key, id.simple().to_string());
        assert_eq!(rec.scope, Some(id));
        assert_eq!(rec.scope(), Scope::Principal(id));
        assert!(rec.etag.is_none());
    }

    #[test]
    fn test_global_record_has_zero_row_key() {
        let rec = record(Scope::Global);
        assert_eq!(rec.row_key, "0".repeat(32));
        assert!(rec.scope.is_none());
    }

    /// Validates that Debug output never carries wrapped bytes.
    #[test]
    fn test_record_debug_is_redacted() {
        let rendered = format!("{:?}", record(Scope::Global));
        assert!(rendered.contains("[256 bytes]"));
        assert!(!rendered.contains("171, 171"));
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let rec = record(Scope::Global);
        assert_eq!(rec.fingerprint().len(), 16);
        assert_eq!(rec.fingerprint(), rec.clone().fingerprint());
    }

    #[test]
    fn test_resolved_key_from_slices() {
        let resolved = ResolvedKey::from_slices(&[7; 32], &[9; 16]).unwrap();
        assert_eq!(resolved.key(), &[7; 32]);
        assert_eq!(resolved.iv(), &[9; 16]);

        assert!(matches!(ResolvedKey::from_slices(&[7; 31], &[9; 16]), Err(KeyVaultError::Decryption(_))));
        assert!(matches!(ResolvedKey::from_slices(&[7; 32], &[9; 8]), Err(KeyVaultError::Decryption(_))));
    }

    #[test]
    fn test_resolved_key_debug_is_redacted() {
        let rendered = format!("{:?}", ResolvedKey::new([0x42; 32], [0x24; 16]));
        assert_eq!(rendered, r#"ResolvedKey { key: "[REDACTED]", iv: "[REDACTED]" }"#);
    }
}
