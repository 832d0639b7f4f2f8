//! Request and response bodies shared by the HTTP client and server.

use crate::models::{RecordKey, RecordKind};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const API_PREFIX: &str = "/api/v1";
pub const SYNC_PATH: &str = "/api/v1/sync";
pub const REGISTER_PATH: &str = "/api/v1/register";
pub const LOGIN_PATH: &str = "/api/v1/login";
pub const HEALTH_PATH: &str = "/health";

/// Per-record RPCs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOp {
    Add,
    Get,
    ForceUpdate,
}

impl RecordOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Get => "get",
            Self::ForceUpdate => "force-update",
        }
    }
}

/// `/api/v1/{kind}/{op}`, e.g. `/api/v1/cards/force-update`.
pub fn record_path(kind: RecordKind, op: RecordOp) -> String {
    format!("{}/{}/{}", API_PREFIX, kind.table(), op.as_str())
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    pub login: String,
    pub password: String,
}

impl fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRequest")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    /// Unix seconds.
    pub expires_at: i64,
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRequest {
    pub key: RecordKey,
}

/// JSON body of every non-2xx reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
