//! Argon2id key derivation and password hashing.
//!
//! Two uses:
//! - Field keys: derived on the client from `(login, password)` with a salt
//!   computed from the login, so every device of a user arrives at the same
//!   key without storing it anywhere.
//! - Account credentials: PHC-format hashes with a random salt, stored in
//!   the `users` table of either store.

use crate::crypto::{CryptoError, CryptoResult, FieldKey};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const FIELD_SALT_LABEL: &[u8] = b"sealbox-field-salt-v1";

/// Parameters for Argon2id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (65,536 = 64 MB)
    pub mem_cost: u32,

    /// Time cost (number of iterations)
    pub time_cost: u32,

    /// Parallelism (number of lanes)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost: 65_536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Verify that parameters are within acceptable ranges
    pub fn validate(&self) -> CryptoResult<()> {
        if self.mem_cost < 8_192 {
            return Err(CryptoError::KdfFailed(
                "Memory cost too low (minimum: 8 MB)".to_string(),
            ));
        }
        if self.time_cost < 1 {
            return Err(CryptoError::KdfFailed(
                "Time cost too low (minimum: 1)".to_string(),
            ));
        }
        if self.parallelism < 1 {
            return Err(CryptoError::KdfFailed(
                "Parallelism too low (minimum: 1)".to_string(),
            ));
        }
        Ok(())
    }

    fn argon2(&self) -> CryptoResult<Argon2<'static>> {
        self.validate()?;
        let params = Params::new(self.mem_cost, self.time_cost, self.parallelism, Some(32))
            .map_err(|e| CryptoError::KdfFailed(format!("Invalid parameters: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Derive the field encryption key for a user.
///
/// The salt is the first 16 bytes of `SHA-256(label || login)`.
pub fn derive_field_key(login: &str, password: &[u8], params: &KdfParams) -> CryptoResult<FieldKey> {
    if login.is_empty() {
        return Err(CryptoError::KdfFailed("Login must not be empty".to_string()));
    }

    let mut hasher = Sha256::new();
    hasher.update(FIELD_SALT_LABEL);
    hasher.update(login.as_bytes());
    let digest = hasher.finalize();

    let mut key = [0u8; 32];
    params
        .argon2()?
        .hash_password_into(password, &digest[..16], &mut key)
        .map_err(|e| CryptoError::KdfFailed(format!("Hashing failed: {}", e)))?;

    Ok(FieldKey::from_bytes(key))
}

/// Hash an account password into a PHC string with a random salt
pub fn hash_password(password: &[u8], params: &KdfParams) -> CryptoResult<String> {
    let mut salt_bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| CryptoError::HashFailed(format!("Salt encoding failed: {}", e)))?;
    let hash = params
        .argon2()?
        .hash_password(password, &salt)
        .map_err(|e| CryptoError::HashFailed(e.to_string()))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string.
///
/// Returns `Ok(false)` on mismatch; errors only for malformed hashes.
pub fn verify_password(password: &[u8], phc: &str) -> CryptoResult<bool> {
    let parsed = PasswordHash::new(phc).map_err(|e| CryptoError::HashFailed(e.to_string()))?;
    match Argon2::default().verify_password(password, &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CryptoError::HashFailed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> KdfParams {
        KdfParams {
            mem_cost: 8_192,
            time_cost: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_kdf_params_default() {
        let params = KdfParams::default();
        assert_eq!(params.mem_cost, 65_536);
        assert_eq!(params.time_cost, 3);
        assert_eq!(params.parallelism, 4);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_kdf_params_validation() {
        let mut params = KdfParams::default();

        params.mem_cost = 1000;
        assert!(params.validate().is_err());

        params.mem_cost = 65_536;
        params.time_cost = 0;
        assert!(params.validate().is_err());

        params.time_cost = 3;
        params.parallelism = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_field_key_is_stable_per_login() {
        let key1 = derive_field_key("alice", b"hunter2", &cheap()).unwrap();
        let key2 = derive_field_key("alice", b"hunter2", &cheap()).unwrap();
        assert_eq!(key1.as_bytes(), key2.as_bytes());

        let other_password = derive_field_key("alice", b"hunter3", &cheap()).unwrap();
        assert_ne!(key1.as_bytes(), other_password.as_bytes());

        let other_login = derive_field_key("bob", b"hunter2", &cheap()).unwrap();
        assert_ne!(key1.as_bytes(), other_login.as_bytes());
    }

    #[test]
    fn test_field_key_requires_login() {
        assert!(derive_field_key("", b"pw", &cheap()).is_err());
    }

    #[test]
    fn test_hash_and_verify_password() {
        let phc = hash_password(b"correct horse", &cheap()).unwrap();
        assert!(phc.starts_with("$argon2id$"));

        assert!(verify_password(b"correct horse", &phc).unwrap());
        assert!(!verify_password(b"wrong horse", &phc).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let first = hash_password(b"same", &cheap()).unwrap();
        let second = hash_password(b"same", &cheap()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert!(verify_password(b"pw", "not-a-phc-string").is_err());
    }
}
