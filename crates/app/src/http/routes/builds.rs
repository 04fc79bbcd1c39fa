use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::http::routes::ErrorBody;
use crate::render::{self, BuildDetail, ClassGroup};
use crate::state::AppState;
use d2builds_core::domain::build::{Build, BuildQuery, BuildSort};
use d2builds_core::error::CoreError;
use d2builds_infra::db::builds_repo::{self, BuildsRepoError};

#[derive(Debug, Default, Deserialize)]
pub struct BuildsParams {
    pub class: Option<String>,
    pub subclass: Option<String>,
    pub mode: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Error)]
pub enum BuildsApiError {
    #[error("db not configured")]
    DbUnavailable,
    #[error("{0}")]
    InvalidQuery(#[from] CoreError),
    #[error("unknown sort: {0}")]
    InvalidSort(String),
    #[error("build not found")]
    NotFound,
    #[error("db error: {0}")]
    Repo(#[from] BuildsRepoError),
}

impl BuildsParams {
    fn into_query(self) -> Result<BuildQuery, BuildsApiError> {
        Ok(BuildQuery {
            class: non_empty(self.class).map(|v| v.parse()).transpose()?,
            subclass: non_empty(self.subclass).map(|v| v.parse()).transpose()?,
            mode: non_empty(self.mode).map(|v| v.parse()).transpose()?,
            sort: parse_sort(non_empty(self.sort).as_deref())?,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_sort(value: Option<&str>) -> Result<BuildSort, BuildsApiError> {
    match value.map(str::trim) {
        None | Some("created") => Ok(BuildSort::CreatedAsc),
        Some("-created") => Ok(BuildSort::CreatedDesc),
        Some("name") => Ok(BuildSort::Name),
        Some(other) => Err(BuildsApiError::InvalidSort(other.to_string())),
    }
}

pub async fn list_builds(
    State(state): State<AppState>,
    Query(params): Query<BuildsParams>,
) -> Result<Json<Vec<ClassGroup>>, BuildsApiError> {
    let pool = state.db.as_ref().ok_or(BuildsApiError::DbUnavailable)?;
    let query = params.into_query()?;
    let records = builds_repo::list_builds(pool, &query).await?;
    let builds = records
        .into_iter()
        .filter_map(|record| {
            let id = record.id.clone();
            Build::try_from(record)
                .inspect_err(|err| warn!(build_id = %id, error = %err, "skipping malformed build"))
                .ok()
        })
        .collect();
    Ok(Json(render::render_listing(&state.manifest, builds).await))
}

pub async fn get_build(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BuildDetail>, BuildsApiError> {
    let pool = state.db.as_ref().ok_or(BuildsApiError::DbUnavailable)?;
    let record = builds_repo::get_build(pool, &id)
        .await?
        .ok_or(BuildsApiError::NotFound)?;
    let build = Build::try_from(record).map_err(|source| BuildsRepoError::Decode { id, source })?;
    Ok(Json(render::render_detail(&state.manifest, build).await))
}

impl IntoResponse for BuildsApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            BuildsApiError::DbUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            BuildsApiError::InvalidQuery(_) | BuildsApiError::InvalidSort(_) => {
                StatusCode::BAD_REQUEST
            }
            BuildsApiError::NotFound => StatusCode::NOT_FOUND,
            BuildsApiError::Repo(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %self, "builds request failed");
        }
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
