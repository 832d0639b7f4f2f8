//! Sync exchange handler.

use crate::auth::Identity;
use crate::error::ServerError;
use crate::state::AppState;
use axum::extract::State;
use axum::{Extension, Json};
use sealbox_core::sync::{merge_incoming, SyncRequest, SyncResponse};

/// `POST /api/v1/sync`: merge the caller's delta and return the remote delta.
///
/// Per-record failures come back in `sync_errors` with a 200.
pub async fn sync(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, ServerError> {
    // Four delta reads plus one write per incoming record.
    let ops = request.len() + 4;
    let login = identity.login;
    let response = state
        .with_store_ops(ops, move |store| merge_incoming(store, &login, &request))
        .await?;
    Ok(Json(response))
}
