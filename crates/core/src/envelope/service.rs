//! Envelope crypto engine - encrypt and decrypt under a scope's data key

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use keystore_domain::{KeyVaultError, Result, Scope};
use tracing::{instrument, trace};

use super::resolver::KeyResolver;
use crate::crypto::cipher;

/// Byte and text encryption for any scope.
///
/// Every call resolves the scope's key first, so both directions create a
/// key on first use. Ciphertext is AES-256-CBC/PKCS#7 under the scope's
/// stored IV: equal plaintexts in one scope encrypt identically.
#[derive(Clone)]
pub struct EnvelopeCrypto {
    resolver: KeyResolver,
}

impl EnvelopeCrypto {
    /// Engine resolving keys through `resolver`
    pub fn new(resolver: KeyResolver) -> Self {
        Self { resolver }
    }

    /// Underlying key resolver
    pub fn resolver(&self) -> &KeyResolver {
        &self.resolver
    }

    /// AES-256-CBC encrypt `plain` under `scope`'s key, creating the key if needed.
    #[instrument(skip_all, fields(scope = %scope, len = plain.len()))]
    pub fn encrypt_bytes(&self, scope: Scope, plain: &[u8]) -> Result<Vec<u8>> {
        let key = self.resolver.resolve(scope)?;
        let ciphertext = cipher::encrypt(&key, plain)?;
        trace!(ciphertext_len = ciphertext.len(), "encrypted");
        Ok(ciphertext)
    }

    /// # Errors
    /// [`KeyVaultError::Decryption`] if the ciphertext is truncated, not a
    /// whole number of blocks, or was produced under another key.
    #[instrument(skip_all, fields(scope = %scope, len = ciphertext.len()))]
    pub fn decrypt_bytes(&self, scope: Scope, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let key = self.resolver.resolve(scope)?;
        cipher::decrypt(&key, ciphertext)
    }

    /// Encrypt UTF-8 text and encode as padded standard base64.
    pub fn encrypt_text(&self, scope: Scope, text: &str) -> Result<String> {
        let ciphertext = self.encrypt_bytes(scope, text.as_bytes())?;
        Ok(BASE64.encode(ciphertext))
    }

    /// Decode base64, decrypt, and decode UTF-8.
    pub fn decrypt_text(&self, scope: Scope, encoded: &str) -> Result<String> {
        let ciphertext = BASE64
            .decode(encoded)
            .map_err(|e| KeyVaultError::Decryption(format!("invalid base64: {e}")))?;
        let plain = self.decrypt_bytes(scope, &ciphertext)?;
        String::from_utf8(plain).map_err(|e| KeyVaultError::Decryption(format!("invalid UTF-8: {e}")))
    }

    /// Create the scope's key if it does not exist yet.
    pub fn ensure_key(&self, scope: Scope) -> Result<()> {
        self.resolver.ensure_key(scope)
    }
}
