use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::http::routes::ErrorBody;
use crate::manifest_cache::ManifestError;
use crate::state::AppState;
use d2builds_core::domain::catalog::BucketCounts;

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub action: &'static str,
    pub counts: BucketCounts,
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("manifest refresh failed: {0}")]
    Manifest(#[from] ManifestError),
}

pub async fn post_manifest_refresh(
    State(state): State<AppState>,
) -> Result<Json<RefreshResponse>, RefreshError> {
    let snapshot = state.manifest.refresh().await?;
    let counts = snapshot.counts();
    info!(
        exotic_armor = counts.exotic_armor,
        mods = counts.mods,
        class_items = counts.exotic_class_items,
        "manifest refreshed by admin"
    );
    Ok(Json(RefreshResponse {
        action: "refresh",
        counts,
    }))
}

impl IntoResponse for RefreshError {
    fn into_response(self) -> Response {
        warn!(error = %self, "admin manifest refresh failed");
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (StatusCode::BAD_GATEWAY, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::http::test_support::test_state;
    use crate::manifest_cache::tests::FakeSource;

    #[tokio::test(start_paused = true)]
    async fn refresh_refetches_a_fresh_snapshot() {
        let source = Arc::new(FakeSource::default());
        let state = test_state(Arc::clone(&source));
        state.manifest.get_manifest().await.unwrap();

        let Json(response) = post_manifest_refresh(State(state)).await.unwrap();
        assert_eq!(response.action, "refresh");
        assert_eq!(source.index_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_failure_is_bad_gateway() {
        let source = Arc::new(FakeSource::default());
        source.drop_class_item.store(true, Ordering::SeqCst);
        let state = test_state(source);
        let err = post_manifest_refresh(State(state)).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
