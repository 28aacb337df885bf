//! # Keystore Infrastructure
//!
//! Infrastructure implementations of the core ports.
//!
//! This crate contains:
//! - Table service backends ([`MemoryTableService`], [`SqliteTableService`])
//! - Configuration loading from environment variables and TOML/JSON files
//! - Tracing subscriber setup
//! - [`KeyVault`]: the fully wired keystore built from a [`KeyVaultConfig`]
//!
//! ## Architecture
//! - Implements traits defined in `keystore-core`
//! - Contains all "impure" code (file I/O, SQLite, process environment)
//!
//! [`KeyVaultConfig`]: keystore_domain::KeyVaultConfig

pub mod config;
pub mod logging;
pub mod tables;
pub mod vault;

// Re-export commonly used items
pub use logging::{init_tracing, LogFormat};
pub use tables::{MemoryTableService, SqliteTableService};
pub use vault::KeyVault;
