use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::http::middleware::admin_auth;
use crate::http::routes::{admin, builds, catalog, health, manifest};
use crate::state::AppState;

pub fn build(state: AppState) -> Router {
    let cors = build_cors(&state.config.cors_allow_origins);
    let mut router = Router::new()
        .route("/health", get(health::health))
        .route("/v1/builds", get(builds::list_builds))
        .route("/v1/builds/{id}", get(builds::get_build))
        .route("/v1/exotics", get(catalog::list_exotics))
        .route("/v1/aspects", get(catalog::list_aspects))
        .route("/v1/fragments", get(catalog::list_fragments))
        .route("/v1/exotic-class-items", get(catalog::list_class_items))
        .route("/v1/exotic-class-items/{class}", get(catalog::get_class_item))
        .route("/v1/items/{kind}/{name}", get(catalog::get_item))
        .route("/v1/manifest/preload", get(manifest::preload))
        .route("/v1/manifest/status", get(manifest::status))
        .route("/v1/admin/login", post(admin::auth::login))
        .route("/v1/admin/logout", post(admin::auth::logout))
        .route("/v1/admin/session", get(admin::auth::session))
        .route("/v1/admin/builds", post(admin::builds::create_build))
        .route(
            "/v1/admin/manifest/refresh",
            post(admin::manifest::post_manifest_refresh),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth::require_admin,
        ))
        .with_state(state);
    if let Some(cors) = cors {
        router = router.layer(cors);
    }
    router
}

fn build_cors(allowed: &[String]) -> Option<CorsLayer> {
    let mut origins = Vec::new();
    let mut allow_any = false;
    for origin in allowed {
        if is_wildcard_origin(origin) {
            allow_any = true;
            break;
        }
        match HeaderValue::from_str(origin.trim()) {
            Ok(value) => origins.push(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "invalid CORS origin ignored");
            }
        }
    }

    if !allow_any && origins.is_empty() {
        return None;
    }

    let cors = CorsLayer::new().allow_methods([Method::GET, Method::POST, Method::OPTIONS]);
    if allow_any {
        Some(cors.allow_origin(Any).allow_headers(Any))
    } else {
        // Credentialed so the admin cookie reaches /v1/admin from the site.
        Some(
            cors.allow_origin(AllowOrigin::list(origins))
                .allow_credentials(true)
                .allow_headers([CONTENT_TYPE, AUTHORIZATION]),
        )
    }
}

fn is_wildcard_origin(origin: &str) -> bool {
    origin.trim() == "*"
}
