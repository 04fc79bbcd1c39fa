use std::sync::Arc;

use reqwest::Client;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::manifest_cache::ManifestCache;
use crate::state::AppState;
use d2builds_infra::db::{connect_lazy, DbPoolError};
use d2builds_infra::manifest::{HttpManifestSource, ManifestSource};

#[derive(Debug, Error)]
pub enum WiringError {
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("db pool error: {0}")]
    Db(#[from] DbPoolError),
}

pub fn build_state(config: AppConfig) -> Result<AppState, WiringError> {
    let client = Client::builder()
        .timeout(config.request_timeout)
        .gzip(true)
        .build()?;

    if config.bungie_api_key.is_empty() {
        warn!("D2BUILDS_BUNGIE_API_KEY is empty; manifest requests will be rejected upstream");
    }
    let source: Arc<dyn ManifestSource> = Arc::new(HttpManifestSource::new(
        client,
        config.bungie_base_url.clone(),
        config.bungie_api_key.clone(),
        config.manifest_language.clone(),
        config.supplemental_url.clone(),
    ));
    let manifest = ManifestCache::new(source, config.bungie_base_url.clone(), config.manifest_ttl);

    let db = match config.database_url.as_deref() {
        Some(url) => Some(connect_lazy(url)?),
        None => {
            info!("D2BUILDS_DATABASE_URL unset; build routes disabled");
            None
        }
    };

    Ok(AppState {
        config: Arc::new(config),
        db,
        manifest,
    })
}
