//! Keystore constants
//!
//! Wire-level names shared by the store, the cache and configuration.

/// Partition every key record lives in
pub const KEY_PARTITION: &str = "SymmetricKey";

/// Prefix of the cache key for a scope's record (`keystore/key/{token}`)
pub const CACHE_KEY_PREFIX: &str = "keystore/key/";

/// Cache token used for the global scope
pub const GLOBAL_CACHE_TOKEN: &str = "none";

/// Table property holding the wrapped AES key (base64)
pub const PROP_WRAPPED_KEY: &str = "WrappedKey";
/// Table property holding the wrapped IV (base64)
pub const PROP_WRAPPED_IV: &str = "WrappedIv";
/// Table property holding the creation time (RFC 3339)
pub const PROP_CREATED_AT: &str = "CreatedAt";
/// Table property holding the owning principal (hyphenated UUID)
pub const PROP_SCOPE: &str = "Scope";

// Symmetric key material
/// AES-256 key length in bytes
pub const AES_KEY_LEN: usize = 32;
/// AES-CBC IV length in bytes
pub const AES_IV_LEN: usize = 16;

// Configuration defaults
/// Key table used when none is configured
pub const DEFAULT_TABLE_NAME: &str = "KeyStore";
/// Bundle file name used when none is configured
pub const DEFAULT_CERTIFICATE_FILE: &str = "keystore.pem";
/// Cache sliding window (three hours)
pub const DEFAULT_SLIDING_WINDOW_SECS: u64 = 3 * 60 * 60;
/// Longest accepted cache sliding window (one year)
pub const MAX_SLIDING_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;
/// Moka cache capacity
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;
/// SQLite connection pool size
pub const DEFAULT_SQLITE_POOL_SIZE: u32 = 4;

// Table name rule: a letter, then 2..=62 alphanumerics
/// Shortest valid table name
pub const TABLE_NAME_MIN_LEN: usize = 3;
/// Longest valid table name
pub const TABLE_NAME_MAX_LEN: usize = 63;
