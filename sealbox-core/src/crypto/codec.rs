//! Field-level AES-256-GCM encryption with a key-derived nonce.
//!
//! Every stored field except the record timestamp passes through here.
//! The nonce is derived from the key alone (HKDF-SHA256), so encryption is
//! deterministic: the same plaintext under the same key always yields the
//! same ciphertext. Stores rely on that to match encrypted key fields
//! (`number`, `prompt`, `login`) by byte equality without seeing plaintext.
//!
//! # Security Notes
//! - A fixed nonce per key means identical plaintexts are distinguishable,
//!   and GCM's confidentiality bound does not hold across the many messages
//!   encrypted under one key. Integrity (the auth tag) is unaffected.
//! - Callers that only need confidentiality should use a randomized-nonce
//!   scheme; swapping in a blind index for key fields only touches
//!   [`FieldCodec`] implementors.

use crate::crypto::{CryptoError, CryptoResult};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

const NONCE_INFO: &[u8] = b"sealbox-field-nonce-v1";
const TAG_LEN: usize = 16;

/// A 256-bit field encryption key.
///
/// Supplied by the caller on every call and never persisted by the codec.
#[derive(Clone)]
pub struct FieldKey {
    key: [u8; 32],
}

impl FieldKey {
    /// Create a key from raw bytes
    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Create a key from a slice, checking its length
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let key: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: 32,
            got: bytes.len(),
        })?;
        Ok(Self { key })
    }

    /// Get the raw key bytes (use sparingly)
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    fn derive_nonce(&self) -> CryptoResult<[u8; 12]> {
        let hk = Hkdf::<Sha256>::new(None, &self.key);
        let mut nonce = [0u8; 12];
        hk.expand(NONCE_INFO, &mut nonce)
            .map_err(|e| CryptoError::EncryptionFailed(format!("HKDF expand failed: {}", e)))?;
        Ok(nonce)
    }
}

impl Drop for FieldKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FieldKey(..)")
    }
}

/// Encrypts and decrypts individual field values.
pub trait FieldCodec {
    /// Encrypt `plaintext` under `key`. Output is `ciphertext || auth_tag(16)`.
    fn encrypt(&self, key: &FieldKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Decrypt a value produced by [`FieldCodec::encrypt`].
    ///
    /// Fails with [`CryptoError::AuthenticationFailed`] on a wrong key or
    /// tampered data.
    fn decrypt(&self, key: &FieldKey, ciphertext: &[u8]) -> CryptoResult<Vec<u8>>;
}

/// AES-256-GCM with a nonce derived from the key.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicAesGcm;

impl FieldCodec for DeterministicAesGcm {
    fn encrypt(&self, key: &FieldKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let cipher = Aes256Gcm::new(key.as_bytes().into());
        let nonce = Nonce::from(key.derive_nonce()?);

        cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(format!("{}", e)))
    }

    fn decrypt(&self, key: &FieldKey, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        if ciphertext.len() < TAG_LEN {
            return Err(CryptoError::DecryptionFailed(
                "Ciphertext too short - missing auth tag".to_string(),
            ));
        }

        let cipher = Aes256Gcm::new(key.as_bytes().into());
        let nonce = Nonce::from(key.derive_nonce()?);

        cipher
            .decrypt(&nonce, ciphertext)
            .map_err(|_| CryptoError::AuthenticationFailed)
    }
}

/// Encrypt a field value with the default codec
pub fn encrypt_field(key: &FieldKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    DeterministicAesGcm.encrypt(key, plaintext)
}

/// Decrypt a field value with the default codec
pub fn decrypt_field(key: &FieldKey, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    DeterministicAesGcm.decrypt(key, ciphertext)
}

/// Decrypt a field value to a string
pub fn decrypt_field_to_string(key: &FieldKey, ciphertext: &[u8]) -> CryptoResult<String> {
    let bytes = decrypt_field(key, ciphertext)?;
    String::from_utf8(bytes).map_err(|_| CryptoError::DecryptionFailed("Invalid UTF-8".to_string()))
}
