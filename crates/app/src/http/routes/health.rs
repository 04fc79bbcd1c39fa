use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub modules: HealthModules,
}

#[derive(Debug, Serialize)]
pub struct HealthModules {
    pub database: DatabaseStatus,
    pub admin: AdminStatus,
    pub manifest: ManifestStatus,
}

#[derive(Debug, Serialize)]
pub struct DatabaseStatus {
    pub configured: bool,
}

#[derive(Debug, Serialize)]
pub struct AdminStatus {
    pub configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ManifestStatus {
    pub cached: bool,
    pub fresh: bool,
    pub rebuilding: bool,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let manifest = state.manifest.status().await;
    Json(HealthResponse {
        status: "ok",
        modules: HealthModules {
            database: DatabaseStatus {
                configured: state.db.is_some(),
            },
            admin: AdminStatus {
                configured: state.config.admin_auth_configured(),
            },
            manifest: ManifestStatus {
                cached: manifest.cached,
                fresh: manifest.fresh,
                rebuilding: manifest.rebuilding,
            },
        },
    })
}
