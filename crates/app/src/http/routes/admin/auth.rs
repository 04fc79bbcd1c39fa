use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::http::middleware::admin_auth;
use crate::http::routes::ErrorBody;
use crate::state::AppState;

const DEFAULT_REMEMBER_DAYS: i64 = 7;
const MAX_REMEMBER_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub password: String,
    pub remember_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AdminLoginResponse {
    pub expires_at: String,
    pub max_age_secs: i64,
}

#[derive(Debug, Serialize)]
pub struct AdminSessionResponse {
    pub configured: bool,
    pub authenticated: bool,
}

#[derive(Debug, Error)]
pub enum AdminLoginError {
    #[error("admin auth not configured")]
    MissingConfig,
    #[error("password is required")]
    MissingPassword,
    #[error("remember_days must be 7 or 30")]
    InvalidRememberDays,
    #[error("invalid password")]
    InvalidPassword,
    #[error("invalid admin password hash")]
    InvalidHash,
    #[error("token issuance failed")]
    TokenIssue,
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AdminLoginRequest>,
) -> Result<Response, AdminLoginError> {
    let password = payload.password.trim();
    if password.is_empty() {
        return Err(AdminLoginError::MissingPassword);
    }

    let (Some(hash), Some(secret)) = (
        state.config.admin_password_hash.as_deref(),
        state.config.admin_token_secret.as_deref(),
    ) else {
        return Err(AdminLoginError::MissingConfig);
    };

    let parsed_hash = PasswordHash::new(hash).map_err(|_| AdminLoginError::InvalidHash)?;
    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AdminLoginError::InvalidPassword);
    }

    let remember_days = resolve_remember_days(payload.remember_days)?;
    let max_age_secs = remember_days.saturating_mul(24 * 60 * 60);
    let token =
        admin_auth::issue_token(secret, max_age_secs).map_err(|_| AdminLoginError::TokenIssue)?;
    let cookie = admin_auth::build_cookie_value(&token, max_age_secs, admin_auth::is_https(&headers));
    info!(remember_days, "admin logged in");

    let expires_at = (Utc::now() + Duration::seconds(max_age_secs)).to_rfc3339();
    let response = Json(AdminLoginResponse {
        expires_at,
        max_age_secs,
    })
    .into_response();
    Ok(admin_auth::attach_cookie(response, cookie))
}

pub async fn logout(headers: HeaderMap) -> Response {
    let cookie = admin_auth::clear_cookie_value(admin_auth::is_https(&headers));
    admin_auth::attach_cookie(StatusCode::NO_CONTENT.into_response(), cookie)
}

pub async fn session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<AdminSessionResponse> {
    Json(AdminSessionResponse {
        configured: state.config.admin_auth_configured(),
        authenticated: admin_auth::is_admin(&state, &headers),
    })
}

fn resolve_remember_days(value: Option<i64>) -> Result<i64, AdminLoginError> {
    let days = value.unwrap_or(DEFAULT_REMEMBER_DAYS);
    match days {
        DEFAULT_REMEMBER_DAYS | MAX_REMEMBER_DAYS => Ok(days),
        _ => Err(AdminLoginError::InvalidRememberDays),
    }
}

impl IntoResponse for AdminLoginError {
    fn into_response(self) -> Response {
        let status = match &self {
            AdminLoginError::MissingConfig | AdminLoginError::InvalidHash => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AdminLoginError::MissingPassword | AdminLoginError::InvalidRememberDays => {
                StatusCode::BAD_REQUEST
            }
            AdminLoginError::InvalidPassword => StatusCode::UNAUTHORIZED,
            AdminLoginError::TokenIssue => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(error = %self, "admin login rejected");
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
