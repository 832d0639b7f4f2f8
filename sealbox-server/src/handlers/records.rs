//! Per-record add / get / force-update, one route set per record kind.

use crate::auth::Identity;
use crate::error::ServerError;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use sealbox_core::transport::wire::KeyRequest;
use sealbox_core::{RecordStore, SecretRecord};

pub async fn add<R: SecretRecord>(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(record): Json<R>,
) -> Result<StatusCode, ServerError> {
    state
        .with_store(move |store| store.add(&identity.login, &record))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get<R: SecretRecord>(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<KeyRequest>,
) -> Result<Json<R>, ServerError> {
    let record = state
        .with_store(move |store| store.get::<R>(&identity.login, &request.key))
        .await?;
    Ok(Json(record))
}

/// Overwrite an existing record regardless of timestamps.
pub async fn force_update<R: SecretRecord>(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(record): Json<R>,
) -> Result<StatusCode, ServerError> {
    let kind = R::KIND;
    state
        .with_store(move |store| store.force_update(&identity.login, &record))
        .await?;
    tracing::info!(kind = %kind, "Record force-updated");
    Ok(StatusCode::NO_CONTENT)
}
