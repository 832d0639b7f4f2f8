//! Record stores: per-user CRUD with last-write-wins upserts.
//!
//! Two SQLite backends share one table layout and one set of statements:
//! - [`RemoteStore`]: the authoritative store behind the server
//! - [`LocalCache`]: the device cache, which also tracks `last_sync` and can
//!   apply a whole remote delta atomically

pub mod local;
pub mod remote;
mod sql;

pub use local::LocalCache;
pub use remote::RemoteStore;

use crate::models::{RecordKey, SecretRecord, Timestamp, TimestampError};
use std::time::Duration;
use thiserror::Error;

/// Default SQLite busy timeout per statement.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors reported by record stores.
///
/// Semantic conflicts get their own variants so callers can tell "stale"
/// from "malformed" from a hard engine failure.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Required field is empty: {0}")]
    NullValues(String),

    #[error("Stored record has a newer version")]
    ExistsDataNewerVersion,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error(transparent)]
    InvalidTimestamp(#[from] TimestampError),

    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// An account row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub login: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    /// Local cache only: the high-water mark of the last completed sync.
    pub last_sync: Option<Timestamp>,
}

/// Per-user, per-variant record CRUD.
pub trait RecordStore {
    /// Insert a record, or overwrite the stored one unless it is newer.
    ///
    /// Fails with [`StoreError::ExistsDataNewerVersion`] when the stored
    /// timestamp is after the incoming one, [`StoreError::NullValues`] when a
    /// required field is empty and [`StoreError::InvalidTimestamp`] when the
    /// timestamp is not UTC `YYYY-MM-DDTHH:MM:SS[.fraction]Z` or is not after
    /// [`Timestamp::beginning_of_time`]. The timestamp text is stored as sent.
    fn add<R: SecretRecord>(&self, user: &str, record: &R) -> StoreResult<()>;

    /// Point lookup by encrypted key tuple.
    fn get<R: SecretRecord>(&self, user: &str, key: &RecordKey) -> StoreResult<R>;

    /// Every record whose timestamp is strictly after `after`, unordered.
    fn get_all_after<R: SecretRecord>(&self, user: &str, after: &Timestamp) -> StoreResult<Vec<R>>;

    /// Overwrite an existing row regardless of timestamps.
    ///
    /// Fails with [`StoreError::NotFound`] when no row has the record's key,
    /// and with the same validation errors as [`RecordStore::add`].
    fn force_update<R: SecretRecord>(&self, user: &str, record: &R) -> StoreResult<()>;
}
