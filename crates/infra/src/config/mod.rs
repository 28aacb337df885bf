//! Configuration loading
//!
//! This module loads a [`KeyVaultConfig`](keystore_domain::KeyVaultConfig)
//! from environment variables or from TOML/JSON files.

pub mod loader;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
