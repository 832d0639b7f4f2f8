//! Sealbox Core Library
//!
//! Encrypted secret records with a remote authoritative store and an
//! offline-capable local cache, reconciled by delta-based last-write-wins
//! sync.

pub mod config;
pub mod crypto;
pub mod models;
pub mod platform;
pub mod store;
pub mod sync;
pub mod transport;
pub mod vault;

pub use config::ClientConfig;
pub use crypto::{
    decrypt_field, decrypt_field_to_string, derive_field_key, encrypt_field, hash_password,
    verify_password, CryptoError, CryptoResult, DeterministicAesGcm, FieldCodec, FieldKey,
    KdfParams,
};
pub use models::{
    BinaryRecord, Card, LoginPwd, RecordKey, RecordKind, SecretRecord, TextRecord, Timestamp,
};
pub use store::{LocalCache, RecordStore, RemoteStore, StoreError, StoreResult, UserAccount};
pub use sync::{SyncCoordinator, SyncError, SyncReport, SyncRequest, SyncResponse};
pub use transport::{DirectTransport, Transport};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use vault::{BinaryData, CardData, LoginData, Session, TextData, Vault};

use thiserror::Error;

/// Result type for sealbox operations
pub type Result<T> = std::result::Result<T, SealboxError>;

/// General error type for sealbox operations
#[derive(Error, Debug)]
pub enum SealboxError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SealboxError {
    /// True when the remote side rejected a write because it holds a newer version.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Store(StoreError::ExistsDataNewerVersion))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::NotFound(_)) | Self::Remote { status: 404, .. }
        )
    }
}
