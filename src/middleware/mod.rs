pub mod auth;
pub mod cors;
pub mod csrf;
pub mod http;
pub mod security_headers;

use axum::{body::Body, extract::MatchedPath, http::Request};

use crate::api::RouteMeta;
use crate::state::AppState;

/// Metadata of the route `req` was matched to. Unmatched requests get the
/// table's fail-closed default.
pub(crate) fn route_meta(state: &AppState, req: &Request<Body>) -> RouteMeta {
    let path = req.extensions().get::<MatchedPath>().map(|p| p.as_str());
    state.routes.lookup(req.method(), path).clone()
}
