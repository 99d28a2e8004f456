use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::service::upload::{create_upload_handler, finish_upload_handler, health_handler};
use crate::utils::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .merge(upload_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn upload_router() -> Router<Arc<AppState>> {
    Router::new()
        // Register a tus session for an object
        .route("/uploads", post(create_upload_handler))
        // Move a completed upload into the content store
        .route("/uploads/{oid}/finish", post(finish_upload_handler))
}
