//! # Keystore Core
//!
//! Key lifecycle logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces ([`TableService`], [`MasterKeyProvider`])
//! - The RSA master key and AES data-key cipher
//! - [`KeyRecordStore`]: cache-first key record persistence
//! - [`KeyResolver`] and [`EnvelopeCrypto`]: scope to key to ciphertext
//!
//! ## Architecture Principles
//! - Depends on `keystore-common` and `keystore-domain` only
//! - Table services are reached through [`TableService`]; backends live in
//!   `keystore-infra`
//! - Synchronous throughout

pub mod crypto;
pub mod envelope;
pub mod storage;

// Re-export specific items to avoid ambiguity
pub use crypto::{MasterKeyProvider, RsaMasterKey};
pub use envelope::{EnvelopeCrypto, KeyResolver};
pub use storage::ports::{TableEntity, TableError, TableResult, TableService};
pub use storage::KeyRecordStore;
