use tracing::{info, warn};

use crate::jobs::JobError;
use crate::state::AppState;

/// Makes sure a fresh snapshot is cached. Within the validity window this
/// is a no-op; past it, the cache rebuilds.
pub async fn run(state: &AppState) -> Result<(), JobError> {
    let snapshot = state.manifest.get_manifest().await?;
    let status = state.manifest.status().await;
    info!(
        age_secs = ?status.age_secs,
        exotic_armor = snapshot.exotic_armor.len(),
        aspects = snapshot.aspects.len(),
        class_items = snapshot.exotic_class_items.len(),
        "manifest refresh checked"
    );
    Ok(())
}

/// Like [`run`], logging instead of failing.
pub async fn warm(state: &AppState) {
    if let Err(err) = run(state).await {
        warn!(error = %err, "manifest warm-up failed");
    }
}
