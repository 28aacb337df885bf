//! # Keystore Domain
//!
//! Types shared by every keystore layer.
//!
//! This crate contains:
//! - [`Scope`]: global or per-principal key ownership, and its row/cache
//!   tokens
//! - [`KeyRecord`]: the persisted, wrapped form of a data key
//! - [`ResolvedKey`]: the unwrapped key and IV, zeroized on drop
//! - [`KeyVaultError`] and the crate-wide [`Result`]
//! - Configuration structures ([`KeyVaultConfig`] and friends)
//!
//! ## Architecture
//! - Depends only on `keystore-common` (error classification)
//! - No I/O, no cryptography beyond fingerprinting

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::{
    CacheBackend, CacheConfig, CertificateConfig, KeyVaultConfig, StoreBackend, StoreBackendKind,
    StoreConfig,
};
pub use errors::{KeyVaultError, Result};
pub use types::{validate_table_name, KeyRecord, ResolvedKey, Scope};
