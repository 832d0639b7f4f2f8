//! Sync exchange wire format.

use crate::models::{BinaryRecord, Card, LoginPwd, RecordKey, RecordKind, TextRecord, Timestamp};
use serde::{Deserialize, Serialize};

/// Client to server: the local delta since `last_sync`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub last_sync: Timestamp,
    #[serde(default)]
    pub cards: Vec<Card>,
    #[serde(default)]
    pub logins: Vec<LoginPwd>,
    #[serde(default)]
    pub texts: Vec<TextRecord>,
    #[serde(default)]
    pub binaries: Vec<BinaryRecord>,
}

impl SyncRequest {
    pub fn len(&self) -> usize {
        self.cards.len() + self.logins.len() + self.texts.len() + self.binaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Server to client: the remote delta minus echoes, plus per-record merge failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    #[serde(default)]
    pub new_cards: Vec<Card>,
    #[serde(default)]
    pub new_logins: Vec<LoginPwd>,
    #[serde(default)]
    pub new_texts: Vec<TextRecord>,
    #[serde(default)]
    pub new_binaries: Vec<BinaryRecord>,
    #[serde(default)]
    pub sync_errors: Vec<SyncError>,
}

impl SyncResponse {
    /// Number of records in the four `new_*` lists.
    pub fn record_count(&self) -> usize {
        self.new_cards.len() + self.new_logins.len() + self.new_texts.len() + self.new_binaries.len()
    }
}

/// One record the remote side could not merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{tag} {key}: {message}")]
pub struct SyncError {
    /// Record kind, e.g. `card`.
    pub tag: String,
    /// Encrypted key tuple, base64 parts joined with `:`.
    pub key: String,
    pub message: String,
}

impl SyncError {
    pub fn new(kind: RecordKind, key: &RecordKey, error: impl std::fmt::Display) -> Self {
        Self {
            tag: kind.as_str().to_string(),
            key: key.to_string(),
            message: error.to_string(),
        }
    }
}

/// Outcome of one client-side exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub pushed: usize,
    pub pulled: usize,
    pub errors: Vec<SyncError>,
    /// The new local high-water mark.
    pub last_sync: Timestamp,
}
