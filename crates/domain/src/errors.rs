//! Error types used throughout the keystore

use std::time::Duration;

use keystore_common::error::{ErrorClassification, ErrorSeverity};
use thiserror::Error;

use crate::types::Scope;

/// Main error type for keystore operations
///
/// Messages never carry key bytes, IVs or plaintext.
#[derive(Error, Debug)]
pub enum KeyVaultError {
    /// Certificate or private key could not be loaded
    #[error("Master key load failed: {0}")]
    KeyLoad(String),

    /// The master key lacks the component an operation needs
    #[error("Master key cannot perform operation: {0}")]
    CryptoUnavailable(String),

    /// Ciphertext was malformed or produced under a different key
    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// The key table has never been created
    #[error("Key table '{table}' does not exist")]
    StoreNotInitialized { table: String },

    /// Transport, authorization or payload failure talking to the store
    #[error("Key store {operation} failed: {message}")]
    StoreAccess { operation: &'static str, message: String, retryable: bool },

    /// Another writer inserted the same row first
    #[error("Key record '{row_key}' already exists")]
    RecordConflict { row_key: String },

    /// A stored record could not be turned into a usable key
    #[error("Key for {scope} could not be resolved")]
    KeyResolution {
        scope: Scope,
        #[source]
        source: Box<KeyVaultError>,
    },

    #[error("No key exists for {scope}")]
    KeyNotFound { scope: Scope },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl KeyVaultError {
    /// Store failure for `operation`.
    pub fn store_access(operation: &'static str, message: impl Into<String>, retryable: bool) -> Self {
        Self::StoreAccess { operation, message: message.into(), retryable }
    }

    /// Wrap `source` as a resolution failure for `scope`.
    pub fn key_resolution(scope: Scope, source: Self) -> Self {
        Self::KeyResolution { scope, source: Box::new(source) }
    }
}

impl ErrorClassification for KeyVaultError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::StoreAccess { retryable, .. } => *retryable,
            // A re-read returns the winning record.
            Self::RecordConflict { .. } => true,
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::KeyNotFound { .. } => ErrorSeverity::Info,
            Self::RecordConflict { .. } | Self::StoreAccess { retryable: true, .. } => {
                ErrorSeverity::Warning
            }
            Self::StoreAccess { retryable: false, .. }
            | Self::StoreNotInitialized { .. }
            | Self::Decryption(_)
            | Self::Encryption(_)
            | Self::Config(_) => ErrorSeverity::Error,
            Self::KeyLoad(_) | Self::CryptoUnavailable(_) | Self::KeyResolution { .. } => {
                ErrorSeverity::Critical
            }
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::KeyLoad(_) | Self::CryptoUnavailable(_) | Self::KeyResolution { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::StoreAccess { retryable: true, .. } => Some(Duration::from_secs(1)),
            _ => None,
        }
    }
}

/// Result type alias for keystore operations
pub type Result<T> = std::result::Result<T, KeyVaultError>;

#[cfg(test)]
mod tests {
    //! Unit tests for errors.
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_store_access_classification() {
        let transient = KeyVaultError::store_access("get", "connection reset", true);
        assert!(transient.is_retryable());
        assert_eq!(transient.severity(), ErrorSeverity::Warning);
        assert_eq!(transient.retry_after(), Some(Duration::from_secs(1)));
        assert_eq!(transient.to_string(), "Key store get failed: connection reset");

        let denied = KeyVaultError::store_access("insert", "unauthorized", false);
        assert!(!denied.is_retryable());
        assert_eq!(denied.severity(), ErrorSeverity::Error);
        assert!(denied.retry_after().is_none());
    }

    /// Validates that resolution failures are critical and keep their cause.
    #[test]
    fn test_key_resolution_wraps_source() {
        let err = KeyVaultError::key_resolution(
            Scope::Global,
            KeyVaultError::Decryption("bad padding".to_string()),
        );

        assert!(err.is_critical());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.to_string(), "Key for global could not be resolved");
        let source = err.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("Decryption failed: bad padding"));
    }

    #[test]
    fn test_severity_map() {
        assert_eq!(KeyVaultError::KeyNotFound { scope: Scope::Global }.severity(), ErrorSeverity::Info);
        assert_eq!(
            KeyVaultError::RecordConflict { row_key: "r".into() }.severity(),
            ErrorSeverity::Warning
        );
        assert_eq!(
            KeyVaultError::StoreNotInitialized { table: "t".into() }.severity(),
            ErrorSeverity::Error
        );
        assert!(KeyVaultError::KeyLoad("x".into()).is_critical());
        assert!(KeyVaultError::CryptoUnavailable("x".into()).is_critical());
        assert!(!KeyVaultError::Config("x".into()).is_critical());
    }
}
