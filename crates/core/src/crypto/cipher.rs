//! AES-256-CBC with PKCS#7 padding under a resolved data key

use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use keystore_domain::{KeyVaultError, ResolvedKey, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const BLOCK_LEN: usize = 16;

/// Encrypt `plain` with the key and the scope's fixed IV.
///
/// Deterministic: the same key and plaintext always yield the same
/// ciphertext.
pub fn encrypt(key: &ResolvedKey, plain: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256CbcEnc::new_from_slices(key.key(), key.iv())
        .map_err(|e| KeyVaultError::Encryption(format!("cipher init: {e}")))?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plain))
}

/// Decrypt and unpad. Output is all-or-nothing.
pub fn decrypt(key: &ResolvedKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(KeyVaultError::Decryption(format!(
            "ciphertext length {} is not a positive multiple of {BLOCK_LEN}",
            ciphertext.len()
        )));
    }

    let cipher = Aes256CbcDec::new_from_slices(key.key(), key.iv())
        .map_err(|e| KeyVaultError::Decryption(format!("cipher init: {e}")))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| KeyVaultError::Decryption("invalid padding".to_owned()))
}
