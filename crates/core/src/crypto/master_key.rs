//! RSA master key loaded from a PEM certificate bundle
//!
//! The bundle holds a `CERTIFICATE` block, an `ENCRYPTED PRIVATE KEY`
//! (PKCS#8, PBES2) block, or both. With both present the certificate's
//! public key must match the private key.
//!
//! Wrapping is RSA PKCS#1 v1.5, which caps the payload at the modulus size
//! minus 11 bytes: plenty for a 32-byte key and a 16-byte IV.

use std::fmt;

use keystore_domain::{KeyVaultError, Result};
use pkcs8::{DecodePrivateKey, DecodePublicKey};
use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use tracing::{debug, info};
use x509_cert::der::{Decode, Encode};
use x509_cert::Certificate;

use super::ports::MasterKeyProvider;

const CERTIFICATE_TAG: &str = "CERTIFICATE";
const ENCRYPTED_KEY_TAG: &str = "ENCRYPTED PRIVATE KEY";
const PLAIN_KEY_TAG: &str = "PRIVATE KEY";

/// Master key pair. The private half is optional: a public-only key can
/// wrap new data keys but never unwrap them.
#[derive(Clone)]
pub struct RsaMasterKey {
    public: RsaPublicKey,
    private: Option<RsaPrivateKey>,
}

impl RsaMasterKey {
    /// Parse a PEM bundle, decrypting the private key with `passphrase`.
    ///
    /// # Errors
    /// [`KeyVaultError::KeyLoad`] if nothing usable parses, the passphrase is
    /// wrong, the key is not RSA, or certificate and key disagree.
    pub fn load(bundle: &[u8], passphrase: &str) -> Result<Self> {
        let blocks = pem::parse_many(bundle)
            .map_err(|e| KeyVaultError::KeyLoad(format!("malformed PEM bundle: {e}")))?;

        let mut certificate_key = None;
        let mut private = None;

        for block in &blocks {
            match block.tag() {
                CERTIFICATE_TAG if certificate_key.is_none() => {
                    certificate_key = Some(public_key_from_certificate(block.contents())?);
                }
                ENCRYPTED_KEY_TAG => {
                    let key = RsaPrivateKey::from_pkcs8_encrypted_der(block.contents(), passphrase)
                        .map_err(|e| {
                            KeyVaultError::KeyLoad(format!("cannot decrypt private key: {e}"))
                        })?;
                    private = Some(key);
                }
                PLAIN_KEY_TAG => {
                    let key = RsaPrivateKey::from_pkcs8_der(block.contents())
                        .map_err(|e| KeyVaultError::KeyLoad(format!("invalid private key: {e}")))?;
                    private = Some(key);
                }
                other => debug!(tag = other, "ignoring PEM block"),
            }
        }

        let public = match (certificate_key, &private) {
            (Some(public), Some(private)) => {
                if private.to_public_key() != public {
                    return Err(KeyVaultError::KeyLoad(
                        "certificate public key does not match the private key".to_owned(),
                    ));
                }
                public
            }
            (Some(public), None) => public,
            (None, Some(private)) => private.to_public_key(),
            (None, None) => {
                return Err(KeyVaultError::KeyLoad(
                    "bundle contains no certificate or private key".to_owned(),
                ))
            }
        };

        let key = Self { public, private };
        info!(modulus_bits = key.modulus_bits(), has_private_key = key.has_private_key(), "master key loaded");
        Ok(key)
    }

    /// Build from an in-memory key pair.
    pub fn from_private_key(private: RsaPrivateKey) -> Self {
        Self { public: private.to_public_key(), private: Some(private) }
    }

    /// Build a wrap-only key.
    pub fn from_public_key(public: RsaPublicKey) -> Self {
        Self { public, private: None }
    }

    /// RSA modulus size in bits
    pub fn modulus_bits(&self) -> usize {
        self.public.size() * 8
    }

    /// Wrap UTF-16LE encoded text.
    pub fn wrap_text(&self, text: &str) -> Result<Vec<u8>> {
        let bytes: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        self.wrap(&bytes)
    }

    /// Unwrap and decode UTF-16LE text.
    pub fn unwrap_text(&self, wrapped: &[u8]) -> Result<String> {
        let bytes = self.unwrap(wrapped)?;
        if bytes.len() % 2 != 0 {
            return Err(KeyVaultError::Decryption("odd-length UTF-16 payload".to_owned()));
        }
        let units: Vec<u16> =
            bytes.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]])).collect();
        String::from_utf16(&units)
            .map_err(|e| KeyVaultError::Decryption(format!("invalid UTF-16 payload: {e}")))
    }
}

impl MasterKeyProvider for RsaMasterKey {
    fn wrap(&self, plain: &[u8]) -> Result<Vec<u8>> {
        self.public
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, plain)
            .map_err(|e| KeyVaultError::Encryption(format!("RSA wrap failed: {e}")))
    }

    fn unwrap(&self, wrapped: &[u8]) -> Result<Vec<u8>> {
        let private = self.private.as_ref().ok_or_else(|| {
            KeyVaultError::CryptoUnavailable("master key has no private component".to_owned())
        })?;
        private
            .decrypt(Pkcs1v15Encrypt, wrapped)
            .map_err(|e| KeyVaultError::Decryption(format!("RSA unwrap failed: {e}")))
    }

    fn has_private_key(&self) -> bool {
        self.private.is_some()
    }
}

impl fmt::Debug for RsaMasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaMasterKey")
            .field("modulus_bits", &self.modulus_bits())
            .field("private", &self.private.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn public_key_from_certificate(der: &[u8]) -> Result<RsaPublicKey> {
    let certificate = Certificate::from_der(der)
        .map_err(|e| KeyVaultError::KeyLoad(format!("invalid certificate: {e}")))?;
    let spki = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| KeyVaultError::KeyLoad(format!("invalid certificate public key: {e}")))?;
    RsaPublicKey::from_public_key_der(&spki)
        .map_err(|e| KeyVaultError::KeyLoad(format!("certificate key is not RSA: {e}")))
}
