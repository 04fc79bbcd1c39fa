use axum::body::Body;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use crate::http::routes::ErrorBody;
use crate::state::AppState;

const ADMIN_COOKIE_NAME: &str = "d2builds_admin";
const ADMIN_PREFIX: &str = "/v1/admin";
/// Reachable without a token: logging in, logging out and asking whether
/// the caller is logged in.
const OPEN_PATHS: [&str; 3] = ["/v1/admin/login", "/v1/admin/logout", "/v1/admin/session"];

#[derive(Debug, Error)]
pub enum AdminAuthError {
    #[error("admin auth not configured")]
    MissingConfig,
    #[error("admin token required")]
    MissingToken,
    #[error("admin token invalid")]
    InvalidToken,
}

#[derive(Debug, Serialize, Deserialize)]
struct AdminTokenPayload {
    exp: i64,
}

fn requires_admin(path: &str) -> bool {
    path.starts_with(ADMIN_PREFIX) && !OPEN_PATHS.contains(&path)
}

pub async fn require_admin(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AdminAuthError> {
    if !requires_admin(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let secret = token_secret(&state).ok_or(AdminAuthError::MissingConfig)?;
    let token = request_token(request.headers()).ok_or(AdminAuthError::MissingToken)?;
    if !verify_token(secret, &token) {
        debug!(path = %request.uri().path(), "rejected admin token");
        return Err(AdminAuthError::InvalidToken);
    }
    Ok(next.run(request).await)
}

fn token_secret(state: &AppState) -> Option<&str> {
    state
        .config
        .admin_token_secret
        .as_deref()
        .filter(|value| !value.is_empty())
}

/// Whether the request carries a valid, unexpired admin token.
pub fn is_admin(state: &AppState, headers: &HeaderMap) -> bool {
    match (token_secret(state), request_token(headers)) {
        (Some(secret), Some(token)) => verify_token(secret, &token),
        _ => false,
    }
}

pub fn issue_token(secret: &str, max_age_secs: i64) -> Result<String, AdminAuthError> {
    let exp = Utc::now().timestamp().saturating_add(max_age_secs);
    let json =
        serde_json::to_vec(&AdminTokenPayload { exp }).map_err(|_| AdminAuthError::InvalidToken)?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(json);
    let signature = sign_token(secret, &payload_b64);
    Ok(format!("{payload_b64}.{signature}"))
}

pub fn build_cookie_value(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{ADMIN_COOKIE_NAME}={token}; Path={ADMIN_PREFIX}; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Expires the admin cookie immediately.
pub fn clear_cookie_value(secure: bool) -> String {
    build_cookie_value("", 0, secure)
}

fn verify_token(secret: &str, token: &str) -> bool {
    let Some((payload_b64, signature)) = token.split_once('.') else {
        return false;
    };
    if payload_b64.is_empty() || signature.is_empty() {
        return false;
    }
    let mut mac = mac_for(secret);
    mac.update(payload_b64.as_bytes());
    let Ok(raw_signature) = URL_SAFE_NO_PAD.decode(signature.as_bytes()) else {
        return false;
    };
    if mac.verify_slice(&raw_signature).is_err() {
        return false;
    }
    decode_payload(payload_b64).is_some_and(|payload| payload.exp > Utc::now().timestamp())
}

fn decode_payload(payload_b64: &str) -> Option<AdminTokenPayload> {
    let bytes = URL_SAFE_NO_PAD.decode(payload_b64.as_bytes()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn mac_for(secret: &str) -> Hmac<Sha256> {
    Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac can take key of any size")
}

fn sign_token(secret: &str, payload_b64: &str) -> String {
    let mut mac = mac_for(secret);
    mac.update(payload_b64.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

fn request_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_value(headers, ADMIN_COOKIE_NAME))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let value = header.trim().strip_prefix("Bearer ")?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, value)| key.trim() == name && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
}

pub fn is_https(headers: &HeaderMap) -> bool {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
    let forwarded_proto = header("x-forwarded-proto").is_some_and(|value| {
        value
            .split(',')
            .any(|part| part.trim().eq_ignore_ascii_case("https"))
    });
    let forwarded = header("forwarded").is_some_and(|value| {
        value
            .split([';', ','])
            .filter_map(|part| part.trim().strip_prefix("proto="))
            .any(|proto| proto.trim().eq_ignore_ascii_case("https"))
    });
    forwarded_proto || forwarded
}

pub fn attach_cookie(mut response: Response, cookie_value: String) -> Response {
    if let Ok(value) = cookie_value.parse() {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}

impl IntoResponse for AdminAuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AdminAuthError::MissingConfig => StatusCode::SERVICE_UNAVAILABLE,
            AdminAuthError::MissingToken | AdminAuthError::InvalidToken => StatusCode::UNAUTHORIZED,
        };
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn issued_token_verifies_until_expiry() {
        let token = issue_token("secret", 60).unwrap();
        assert!(verify_token("secret", &token));
        assert!(!verify_token("other", &token));

        let expired = issue_token("secret", -1).unwrap();
        assert!(!verify_token("secret", &expired));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = issue_token("secret", 60).unwrap();
        let (_, signature) = token.split_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(br#"{"exp":99999999999}"#);
        assert!(!verify_token("secret", &format!("{forged_payload}.{signature}")));
        assert!(!verify_token("secret", "no-dot"));
        assert!(!verify_token("secret", "."));
    }

    #[test]
    fn guarded_paths_exclude_open_endpoints() {
        assert!(requires_admin("/v1/admin/builds"));
        assert!(requires_admin("/v1/admin/manifest/refresh"));
        assert!(!requires_admin("/v1/admin/login"));
        assert!(!requires_admin("/v1/admin/session"));
        assert!(!requires_admin("/v1/builds"));
    }

    #[test]
    fn token_read_from_bearer_or_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; d2builds_admin=abc.def"),
        );
        assert_eq!(request_token(&headers).as_deref(), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok.sig"));
        assert_eq!(request_token(&headers).as_deref(), Some("tok.sig"));
    }

    #[test]
    fn cookies_carry_path_and_age() {
        let cookie = build_cookie_value("token", 60, true);
        assert!(cookie.starts_with("d2builds_admin=token;"));
        assert!(cookie.contains("Path=/v1/admin"));
        assert!(cookie.contains("Max-Age=60"));
        assert!(cookie.ends_with("; Secure"));
        assert!(clear_cookie_value(false).contains("Max-Age=0"));
    }

    #[test]
    fn https_detected_from_forwarding_headers() {
        let mut headers = HeaderMap::new();
        assert!(!is_https(&headers));
        headers.insert("forwarded", HeaderValue::from_static("for=1.2.3.4;proto=https"));
        assert!(is_https(&headers));

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-proto", HeaderValue::from_static("http, https"));
        assert!(is_https(&headers));
    }
}
