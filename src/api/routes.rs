use crate::api::handlers::{health::health, session};
use crate::api::route_table::{RouteBuilder, RouteMeta};

/// All routes served by the portal auth service, with their metadata.
pub fn routes() -> RouteBuilder {
    RouteBuilder::new()
        .get("/health", health, RouteMeta::public())
        // Precedes any session, so it cannot carry a CSRF header.
        .post(
            "/auth/login",
            session::login,
            RouteMeta::public().csrf_exempt(),
        )
        // The access token is usually expired here; the refresh cookie is the credential.
        .post("/auth/refresh", session::refresh, RouteMeta::public())
        .post("/auth/logout", session::logout, RouteMeta::public())
        .get("/auth/me", session::me, RouteMeta::protected())
}
