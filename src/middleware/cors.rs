//! CORS policy for the portal SPA.
//!
//! The session lives in cookies, so cross-origin calls must be credentialed,
//! and credentialed CORS forbids a wildcard origin.
//!
//! - Production: exact-match allow-list from `CORS_ALLOWED_ORIGINS`. An empty
//!   list allows no cross-origin caller at all.
//! - Development: the request origin is mirrored back.

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::api::cookies::CSRF_HEADER;
use crate::config::Config;

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(600);

fn allow_origin(config: &Config) -> AllowOrigin {
    if !config.app_env.is_production() {
        return AllowOrigin::mirror_request();
    }

    let allowed: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    AllowOrigin::predicate(move |origin: &HeaderValue, _| allowed.contains(origin))
}

pub fn apply(router: Router, config: &Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allow_origin(config))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(CSRF_HEADER),
            HeaderName::from_static("x-request-id"),
        ])
        .max_age(PREFLIGHT_MAX_AGE);

    router.layer(cors)
}
