//! Key material
//!
//! - [`MasterKeyProvider`]: wraps data keys at rest
//! - [`RsaMasterKey`]: RSA PKCS#1 v1.5 provider loaded from a PEM bundle
//! - [`cipher`]: AES-256-CBC/PKCS#7 under an unwrapped data key

pub mod cipher;
mod master_key;
pub mod ports;

pub use master_key::RsaMasterKey;
pub use ports::MasterKeyProvider;
