//! Axum router setup

use crate::ServerState;
use crate::handlers::{delete_codegraph, health_check, ingest_codegraph};
use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/codegraph", post(ingest_codegraph))
        .route("/api/codegraph/:feature_id", delete(delete_codegraph))
        .route("/healthcheck", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
