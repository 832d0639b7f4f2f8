//! Server error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sealbox_core::{CryptoError, StoreError};

/// Server error types mapped to HTTP status codes.
#[derive(Debug)]
pub enum ServerError {
    BadRequest(String),
    Auth(String),
    NotFound(String),
    Conflict(String),
    Timeout,
    Internal(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(e) => write!(f, "Bad request: {}", e),
            Self::Auth(e) => write!(f, "Auth error: {}", e),
            Self::NotFound(e) => write!(f, "Not found: {}", e),
            Self::Conflict(e) => write!(f, "Conflict: {}", e),
            Self::Timeout => write!(f, "Store operation timed out"),
            Self::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::BadRequest(e) | Self::Auth(e) | Self::NotFound(e) | Self::Conflict(e) => {
                e.clone()
            }
            Self::Timeout => self.to_string(),
            Self::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                "Internal server error".to_string()
            }
        };

        let body = serde_json::json!({ "error": message });
        (self.status(), axum::Json(body)).into_response()
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NullValues(_) | StoreError::InvalidTimestamp(_) => {
                Self::BadRequest(e.to_string())
            }
            StoreError::ExistsDataNewerVersion | StoreError::UserExists(_) => {
                Self::Conflict(e.to_string())
            }
            StoreError::NotFound(_) => Self::NotFound(e.to_string()),
            StoreError::Consistency(_) | StoreError::Database(_) | StoreError::LockPoisoned(_) => {
                Self::Internal(e.to_string())
            }
        }
    }
}

impl From<CryptoError> for ServerError {
    fn from(e: CryptoError) -> Self {
        Self::Internal(e.to_string())
    }
}
