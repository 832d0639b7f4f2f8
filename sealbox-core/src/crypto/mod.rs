//! Cryptographic primitives for sealbox.
//!
//! This module provides:
//! - Deterministic AES-256-GCM field encryption
//! - Argon2id key derivation for field keys
//! - Argon2id password hashing for account credentials

pub mod codec;
pub mod kdf;

pub use codec::{
    decrypt_field, decrypt_field_to_string, encrypt_field, DeterministicAesGcm, FieldCodec,
    FieldKey,
};
pub use kdf::{derive_field_key, hash_password, verify_password, KdfParams};

use thiserror::Error;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Key derivation failed: {0}")]
    KdfFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Authentication failed - wrong key or data has been tampered with")]
    AuthenticationFailed,

    #[error("Password hashing failed: {0}")]
    HashFailed(String),
}

/// Result type for crypto operations
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;
