//! Auth guard: route metadata → access token → permission requirement.
//!
//! - `is_public` routes run without looking at any token, so an expired or
//!   mangled cookie never breaks a public page.
//! - Every token failure (missing, malformed, expired, bad signature, wrong
//!   kind) is the same 401.
//! - A route requirement is checked against the role held by the user
//!   directory, never against anything the client sent.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::{self, Next},
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, error, warn};

use crate::api::cookies::{self, ACCESS_TOKEN};
use crate::api::extractors::AuthCtx;
use crate::error::AppError;
use crate::middleware::route_meta;
use crate::state::AppState;

pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

/// `accessToken` cookie first, `Authorization: Bearer` as a fallback for
/// non-browser callers.
fn access_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    cookies::value(&jar, ACCESS_TOKEN).or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let meta = route_meta(&state, &req);
    if meta.is_public {
        return Ok(next.run(req).await);
    }

    let Some(token) = access_token(req.headers()) else {
        debug!(path = %req.uri().path(), "no access token presented");
        return Err(AppError::Unauthenticated);
    };

    let verified = match state.sessions.tokens().verify_access(&token) {
        Ok(v) => v,
        Err(err) => {
            warn!(error = %err, "access token verification failed");
            return Err(AppError::Unauthenticated);
        }
    };

    if let Some(requirement) = &meta.requirement {
        let role = state
            .directory
            .find_role(verified.principal.role_id)
            .await
            .map_err(|e| {
                error!(error = %e, "role lookup failed");
                AppError::Internal
            })?;

        if !role.is_some_and(|r| requirement.is_satisfied_by(&r)) {
            warn!(
                user_id = %verified.principal.id,
                path = %req.uri().path(),
                "permission requirement not met"
            );
            return Err(AppError::Forbidden);
        }
    }

    req.extensions_mut()
        .insert(AuthCtx::new(verified.principal, verified.jti));

    Ok(next.run(req).await)
}
