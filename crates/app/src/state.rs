use std::sync::Arc;

use crate::config::AppConfig;
use crate::manifest_cache::ManifestCache;
use d2builds_infra::db::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Option<DbPool>,
    pub manifest: ManifestCache,
}
