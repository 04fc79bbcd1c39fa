use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{info, warn};

use crate::http::routes::ErrorBody;
use crate::state::AppState;
use d2builds_core::domain::build::{Build, BuildForm};
use d2builds_core::error::CoreError;
use d2builds_infra::db::builds_repo::{self, BuildsRepoError};

#[derive(Debug, Error)]
pub enum CreateBuildError {
    #[error("db not configured")]
    DbUnavailable,
    #[error("{0}")]
    Invalid(#[from] CoreError),
    #[error("parent build {0} not found")]
    MissingParent(String),
    #[error("db error: {0}")]
    Repo(#[from] BuildsRepoError),
}

pub async fn create_build(
    State(state): State<AppState>,
    Json(form): Json<BuildForm>,
) -> Result<(StatusCode, Json<Build>), CreateBuildError> {
    let new_build = form.validate()?;
    let pool = state.db.as_ref().ok_or(CreateBuildError::DbUnavailable)?;
    if let Some(parent) = new_build.parent_build_id.as_deref() {
        if builds_repo::get_build(pool, parent).await?.is_none() {
            return Err(CreateBuildError::MissingParent(parent.to_string()));
        }
    }

    let record = builds_repo::create_build(pool, &new_build).await?;
    let id = record.id.clone();
    let build = Build::try_from(record).map_err(|source| BuildsRepoError::Decode {
        id: id.clone(),
        source,
    })?;
    info!(build_id = %id, class = %build.class, subclass = %build.subclass, "build created");
    Ok((StatusCode::CREATED, Json(build)))
}

impl IntoResponse for CreateBuildError {
    fn into_response(self) -> Response {
        let status = match &self {
            CreateBuildError::DbUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            CreateBuildError::Invalid(_) | CreateBuildError::MissingParent(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CreateBuildError::Repo(BuildsRepoError::Duplicate(_)) => StatusCode::CONFLICT,
            CreateBuildError::Repo(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(error = %self, status = status.as_u16(), "create build rejected");
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::http::test_support::test_state;
    use crate::manifest_cache::tests::FakeSource;

    fn form() -> BuildForm {
        BuildForm {
            name: "Arc Titan Punch".to_string(),
            class: "Titan".to_string(),
            subclass: "Arc".to_string(),
            description: "Punch everything in sight.".to_string(),
            exotics: "Synthoceps".to_string(),
            aspects: "Knockout".to_string(),
            fragments: "Spark of Shock".to_string(),
            how_it_works: "Melee kills recharge melee.".to_string(),
            ..BuildForm::default()
        }
    }

    #[tokio::test]
    async fn invalid_form_is_unprocessable() {
        let state = test_state(Arc::new(FakeSource::default()));
        let invalid = BuildForm {
            subclass: "Kinetic".to_string(),
            ..form()
        };
        let err = create_build(State(state), Json(invalid)).await.unwrap_err();
        assert!(matches!(err, CreateBuildError::Invalid(_)));
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn valid_form_needs_a_database() {
        let state = test_state(Arc::new(FakeSource::default()));
        let err = create_build(State(state), Json(form())).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn duplicate_slug_is_conflict() {
        let err = CreateBuildError::Repo(BuildsRepoError::Duplicate("arc-titan-punch".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }
}
