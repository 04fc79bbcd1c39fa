pub mod scheduler;
pub mod tasks;

use thiserror::Error;
use tracing::info;

use crate::manifest_cache::ManifestError;
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
}

/// Warms the manifest cache, then keeps it fresh on an interval. A zero
/// interval warms once and returns.
pub async fn start(state: AppState) -> Result<(), JobError> {
    let interval = state.config.manifest_refresh_interval;
    if interval.is_zero() {
        info!("manifest refresh disabled; warming once");
        tasks::manifest_refresh::warm(&state).await;
        return Ok(());
    }

    let refresh_state = state.clone();
    scheduler::run_interval("manifest_refresh", interval, move || {
        let state = refresh_state.clone();
        async move { tasks::manifest_refresh::run(&state).await }
    })
    .await
}
