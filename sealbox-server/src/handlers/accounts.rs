//! Account registration and login.

use crate::error::ServerError;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use sealbox_core::transport::wire::{AuthRequest, AuthResponse};
use sealbox_core::{hash_password, verify_password};

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<AuthRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ServerError> {
    if req.login.is_empty() || req.password.is_empty() {
        return Err(ServerError::BadRequest(
            "Login and password must not be empty".to_string(),
        ));
    }

    let kdf = state.kdf.clone();
    let password = req.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(password.as_bytes(), &kdf))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    let login = req.login.clone();
    state
        .with_store(move |store| store.create_user(&login, &hash))
        .await?;
    tracing::info!(login = %req.login, "Registered account");

    let (token, expires_at) = state.tokens.issue(&req.login)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, expires_at })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, ServerError> {
    let rejected = || ServerError::Auth("Invalid login or password".to_string());

    let login = req.login.clone();
    let account = match state.with_store(move |store| store.user(&login)).await {
        Ok(account) => account,
        Err(ServerError::NotFound(_)) => {
            tracing::warn!(login = %req.login, "Login for unknown account");
            return Err(rejected());
        }
        Err(e) => return Err(e),
    };

    let password = req.password;
    let matches = tokio::task::spawn_blocking(move || {
        verify_password(password.as_bytes(), &account.password_hash)
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))??;

    if !matches {
        tracing::warn!(login = %req.login, "Login with wrong password");
        return Err(rejected());
    }

    let (token, expires_at) = state.tokens.issue(&req.login)?;
    Ok(Json(AuthResponse { token, expires_at }))
}
