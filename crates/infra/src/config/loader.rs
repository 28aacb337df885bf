//! Configuration loader
//!
//! Loads keystore configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the required variables are missing, falls back to a config file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Whatever the source, the result is checked with
//! [`KeyVaultConfig::validate`] before it is returned.
//!
//! ## Environment Variables
//! Required:
//! - `KEYSTORE_TABLE_NAME`: Key table name
//! - `KEYSTORE_CERTIFICATE_DIR`: Directory holding the master key bundle
//!
//! Optional:
//! - `KEYSTORE_CERTIFICATE_NAME`: Bundle file name (default `keystore.pem`)
//! - `KEYSTORE_CERTIFICATE_PASSPHRASE`: Private key passphrase
//! - `KEYSTORE_STORE_BACKEND`: `memory` or `sqlite` (default `memory`)
//! - `KEYSTORE_SQLITE_PATH`: Database file, required for `sqlite`
//! - `KEYSTORE_SQLITE_POOL_SIZE`: Connection pool size (default 4)
//! - `KEYSTORE_PROVISION_TABLE`: Create the table at startup (true/false)
//! - `KEYSTORE_CACHE_BACKEND`: `memory` or `moka` (default `memory`)
//! - `KEYSTORE_CACHE_SLIDING_SECS`: Cache sliding window in seconds
//! - `KEYSTORE_CACHE_MAX_CAPACITY`: Moka cache capacity
//! - `KEYSTORE_DEFAULT_SCOPE`: UUID of the scope ensured at startup
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./keystore.{json,toml}` then `./config.{json,toml}`
//! 2. The same names in the parent and grandparent directories
//! 3. The same names relative to the executable location

use std::path::{Path, PathBuf};

use keystore_domain::constants::DEFAULT_SQLITE_POOL_SIZE;
use keystore_domain::{
    CacheBackend, CacheConfig, CertificateConfig, KeyVaultConfig, KeyVaultError, Result,
    StoreBackend, StoreBackendKind, StoreConfig,
};
use uuid::Uuid;

const CONFIG_FILE_NAMES: [&str; 4] =
    ["keystore.json", "keystore.toml", "config.json", "config.toml"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If a required
/// variable is missing or invalid, falls back to loading from a config
/// file.
///
/// # Errors
/// Returns `KeyVaultError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load() -> Result<KeyVaultConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Environment Variables
/// See module documentation for the complete list.
///
/// # Errors
/// Returns `KeyVaultError::Config` if required variables are missing
/// or any variable has an invalid value.
pub fn load_from_env() -> Result<KeyVaultConfig> {
    let table_name = env_var("KEYSTORE_TABLE_NAME")?;
    let certificate_dir = env_var("KEYSTORE_CERTIFICATE_DIR")?;

    let kind = env_opt("KEYSTORE_STORE_BACKEND")
        .map(|s| s.parse::<StoreBackendKind>().map_err(KeyVaultError::Config))
        .transpose()?
        .unwrap_or(StoreBackendKind::Memory);
    let backend = match kind {
        StoreBackendKind::Memory => StoreBackend::Memory,
        StoreBackendKind::Sqlite => {
            let path = env_var("KEYSTORE_SQLITE_PATH")?;
            let pool_size = env_opt("KEYSTORE_SQLITE_POOL_SIZE")
                .map(|s| {
                    s.parse::<u32>()
                        .map_err(|e| KeyVaultError::Config(format!("Invalid pool size: {e}")))
                })
                .transpose()?
                .unwrap_or(DEFAULT_SQLITE_POOL_SIZE);
            StoreBackend::Sqlite { path: PathBuf::from(path), pool_size }
        }
    };

    let mut certificate =
        CertificateConfig { directory: PathBuf::from(certificate_dir), ..CertificateConfig::default() };
    if let Some(file_name) = env_opt("KEYSTORE_CERTIFICATE_NAME") {
        certificate.file_name = file_name;
    }
    if let Some(passphrase) = env_opt("KEYSTORE_CERTIFICATE_PASSPHRASE") {
        certificate.passphrase = passphrase;
    }

    let mut cache = CacheConfig::default();
    if let Some(backend) = env_opt("KEYSTORE_CACHE_BACKEND") {
        cache.backend = backend.parse::<CacheBackend>().map_err(KeyVaultError::Config)?;
    }
    if let Some(secs) = env_opt("KEYSTORE_CACHE_SLIDING_SECS") {
        cache.sliding_window_secs = secs
            .parse()
            .map_err(|e| KeyVaultError::Config(format!("Invalid cache sliding window: {e}")))?;
    }
    if let Some(capacity) = env_opt("KEYSTORE_CACHE_MAX_CAPACITY") {
        cache.max_capacity = capacity
            .parse()
            .map_err(|e| KeyVaultError::Config(format!("Invalid cache capacity: {e}")))?;
    }

    let default_scope = env_opt("KEYSTORE_DEFAULT_SCOPE")
        .map(|s| {
            Uuid::parse_str(s.trim())
                .map_err(|e| KeyVaultError::Config(format!("Invalid default scope: {e}")))
        })
        .transpose()?;

    let config = KeyVaultConfig {
        store: StoreConfig {
            table_name,
            backend,
            provision_table: env_bool("KEYSTORE_PROVISION_TABLE", false)?,
        },
        certificate,
        cache,
        default_scope,
    };
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `KeyVaultError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<KeyVaultConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(KeyVaultError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            KeyVaultError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| KeyVaultError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<KeyVaultConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| KeyVaultError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| KeyVaultError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(KeyVaultError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches the current working directory, its two parents, then the same
/// three levels relative to the executable.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| [root.clone(), root.join(".."), root.join("../..")])
        .flat_map(|dir| CONFIG_FILE_NAMES.map(|name| dir.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        KeyVaultError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Optional environment variable; empty values count as unset
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
/// Unset or empty yields `default`; anything else is a config error.
fn env_bool(key: &str, default: bool) -> Result<bool> {
    let Some(raw) = env_opt(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(KeyVaultError::Config(format!("Invalid boolean for {key}: {raw}"))),
    }
}
