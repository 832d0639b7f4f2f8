//! Axum router setup.

use crate::auth::auth_middleware;
use crate::config::ServerConfig;
use crate::handlers::{accounts, records, sync};
use crate::state::AppState;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use sealbox_core::transport::wire::{
    record_path, RecordOp, HEALTH_PATH, LOGIN_PATH, REGISTER_PATH, SYNC_PATH,
};
use sealbox_core::{BinaryRecord, Card, LoginPwd, SecretRecord, TextRecord};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    // Authenticated routes
    let authenticated = Router::new().route(SYNC_PATH, post(sync::sync));
    let authenticated = record_routes::<Card>(authenticated);
    let authenticated = record_routes::<LoginPwd>(authenticated);
    let authenticated = record_routes::<TextRecord>(authenticated);
    let authenticated = record_routes::<BinaryRecord>(authenticated).layer(
        middleware::from_fn_with_state(state.clone(), auth_middleware),
    );

    // Unauthenticated routes
    let public = Router::new()
        .route(REGISTER_PATH, post(accounts::register))
        .route(LOGIN_PATH, post(accounts::login))
        .route(HEALTH_PATH, get(health));

    Router::new()
        .merge(authenticated)
        .merge(public)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.max_payload_size))
        .with_state(state)
}

fn record_routes<R: SecretRecord>(router: Router<AppState>) -> Router<AppState> {
    router
        .route(&record_path(R::KIND, RecordOp::Add), post(records::add::<R>))
        .route(&record_path(R::KIND, RecordOp::Get), post(records::get::<R>))
        .route(
            &record_path(R::KIND, RecordOp::ForceUpdate),
            post(records::force_update::<R>),
        )
}

async fn health() -> &'static str {
    "ok"
}
