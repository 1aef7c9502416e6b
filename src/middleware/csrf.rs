//! CSRF double-submit guard.
//!
//! GET/POST without a known session mint one: `sid` (httpOnly) identifies it,
//! `csrfToken` (readable) carries the secret. POST/PUT/PATCH/DELETE must echo
//! that secret in `x-csrf-token` unless the route is flagged `csrf_exempt`.
//! Absent and wrong values get the same 403.
//!
//! Exempt routes never mint: the only exempt route is login, which issues its
//! own session on success.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Method, Request, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, warn};

use crate::api::cookies::{self, CSRF_HEADER, CSRF_TOKEN, SESSION_ID};
use crate::error::AppError;
use crate::middleware::route_meta;
use crate::services::csrf::{CsrfError, CsrfSession};
use crate::state::AppState;

pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, csrf_middleware))
}

fn mints_session(method: &Method) -> bool {
    method == Method::GET || method == Method::POST
}

fn is_state_changing(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method)
}

fn sets_cookie(response: &Response, name: &str) -> bool {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .any(|v| v.to_str().is_ok_and(|s| s.starts_with(&prefix)))
}

fn backend_error(e: CsrfError) -> AppError {
    error!(error = %e, "csrf store failure");
    AppError::Internal
}

async fn csrf_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let meta = route_meta(&state, &req);
    let method = req.method().clone();
    let sid = cookies::value(&CookieJar::from_headers(req.headers()), SESSION_ID);

    let mut minted: Option<CsrfSession> = None;
    if mints_session(&method) && !meta.csrf_exempt {
        let (session, is_new) = state
            .csrf
            .ensure(sid.as_deref())
            .await
            .map_err(backend_error)?;
        if is_new {
            minted = Some(session);
        }
    }

    let attach = |response: Response, minted: Option<CsrfSession>| -> Response {
        match minted {
            Some(session) if !sets_cookie(&response, CSRF_TOKEN) => (
                state.cookies.with_csrf_session(CookieJar::new(), &session),
                response,
            )
                .into_response(),
            _ => response,
        }
    };

    if is_state_changing(&method) && !meta.csrf_exempt {
        let provided = req
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok());

        // Checked against the session the request arrived with, never a fresh one.
        match state.csrf.verify(sid.as_deref(), provided).await {
            Ok(()) => {}
            Err(CsrfError::Rejected) => {
                warn!(method = %method, path = %req.uri().path(), "csrf token rejected");
                return Ok(attach(AppError::CsrfRejected.into_response(), minted));
            }
            Err(e) => return Err(backend_error(e)),
        }
    }

    let response = next.run(req).await;
    Ok(attach(response, minted))
}
