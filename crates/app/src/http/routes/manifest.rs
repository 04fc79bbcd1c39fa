use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::http::routes::ErrorBody;
use crate::manifest_cache::{CacheStatus, ManifestError};
use crate::state::AppState;
use d2builds_core::domain::catalog::BucketCounts;

#[derive(Debug, Serialize)]
pub struct PreloadResponse {
    pub success: bool,
    pub counts: BucketCounts,
}

#[derive(Debug, Error)]
pub enum PreloadError {
    #[error("failed to preload manifest: {0}")]
    Manifest(#[from] ManifestError),
}

/// Blocks until a snapshot is available.
pub async fn preload(State(state): State<AppState>) -> Result<Json<PreloadResponse>, PreloadError> {
    let snapshot = state.manifest.get_manifest().await?;
    Ok(Json(PreloadResponse {
        success: true,
        counts: snapshot.counts(),
    }))
}

pub async fn status(State(state): State<AppState>) -> Json<CacheStatus> {
    Json(state.manifest.status().await)
}

impl IntoResponse for PreloadError {
    fn into_response(self) -> Response {
        warn!(error = %self, "manifest preload failed");
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}
