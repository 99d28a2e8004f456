use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::header::{HeaderMap, LOCATION};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::warn;

use crate::error::AppError;
use crate::utils::state::AppState;
use crate::utils::validation::is_valid_oid;

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUploadRequest {
    pub oid: String,
    pub size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub oid: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// POST /uploads
pub async fn create_upload_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateUploadRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !is_valid_oid(&body.oid) {
        return Err(AppError::OidInvalid(body.oid));
    }

    let href = state.tus.create(&body.oid, body.size, &headers).await?;
    Ok((
        StatusCode::CREATED,
        [(LOCATION, href.clone())],
        Json(UploadResponse {
            oid: body.oid,
            size: body.size,
            href: Some(href),
        }),
    ))
}

/// POST /uploads/{oid}/finish
pub async fn finish_upload_handler(
    State(state): State<Arc<AppState>>,
    Path(oid): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !is_valid_oid(&oid) {
        return Err(AppError::OidInvalid(oid));
    }

    let meta = state.tus.finish(&oid, state.store.as_ref()).await?;
    Ok(Json(UploadResponse {
        oid: meta.oid,
        size: meta.size,
        href: None,
    }))
}

/// How long a health check waits for an in-flight tus operation.
const HEALTH_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// GET /healthz
///
/// Reports 503 when tusd is down, and also when a tus operation holds the
/// supervisor for longer than [`HEALTH_LOCK_TIMEOUT`].
pub async fn health_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    match timeout(HEALTH_LOCK_TIMEOUT, state.tus.is_running()).await {
        Ok(true) => StatusCode::OK,
        Ok(false) => StatusCode::SERVICE_UNAVAILABLE,
        Err(_) => {
            warn!(func = "healthz", "tus supervisor busy, reporting unavailable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
