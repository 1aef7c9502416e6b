//! Route metadata read by the CSRF and auth middlewares.
//!
//! Every route is declared once, through [`RouteBuilder`], with its handler and
//! its [`RouteMeta`]. The middlewares look the metadata up by method and
//! matched path; nothing in the request path compares URL strings.

use std::collections::HashMap;

use axum::{
    Router,
    handler::Handler,
    http::Method,
    routing::{delete, get, patch, post, put},
};

use crate::permissions::Requirement;
use crate::state::AppState;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMeta {
    /// Skip token checks entirely, even when a broken token is present.
    pub is_public: bool,
    /// Mutating requests to this route need no CSRF header (login).
    pub csrf_exempt: bool,
    /// Permissions evaluated against the caller's role after authentication.
    pub requirement: Option<Requirement>,
}

impl RouteMeta {
    pub fn protected() -> Self {
        Self::default()
    }

    pub fn public() -> Self {
        Self {
            is_public: true,
            ..Self::default()
        }
    }

    pub fn csrf_exempt(mut self) -> Self {
        self.csrf_exempt = true;
        self
    }

    pub fn require(mut self, requirement: Requirement) -> Self {
        self.requirement = Some(requirement);
        self
    }
}

/// Lookup table keyed by `(method, route path)`, built once at startup.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: HashMap<(Method, String), RouteMeta>,
    // Unknown routes are protected and CSRF-checked.
    fallback: RouteMeta,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, method: Method, path: &str, meta: RouteMeta) {
        self.entries.insert((method, path.to_string()), meta);
    }

    pub fn lookup(&self, method: &Method, path: Option<&str>) -> &RouteMeta {
        path.and_then(|p| self.entries.get(&(method.clone(), p.to_string())))
            .unwrap_or(&self.fallback)
    }
}

/// Builds the router and its [`RouteTable`] side by side so the two cannot
/// drift apart.
pub struct RouteBuilder {
    router: Router<AppState>,
    table: RouteTable,
}

impl Default for RouteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! method_fn {
    ($name:ident, $method:expr, $routing:ident) => {
        pub fn $name<H, T>(mut self, path: &str, handler: H, meta: RouteMeta) -> Self
        where
            H: Handler<T, AppState>,
            T: 'static,
        {
            self.table.insert($method, path, meta);
            self.router = self.router.route(path, $routing(handler));
            self
        }
    };
}

impl RouteBuilder {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            table: RouteTable::new(),
        }
    }

    method_fn!(get, Method::GET, get);
    method_fn!(post, Method::POST, post);
    method_fn!(put, Method::PUT, put);
    method_fn!(patch, Method::PATCH, patch);
    method_fn!(delete, Method::DELETE, delete);

    pub fn build(self) -> (Router<AppState>, RouteTable) {
        (self.router, self.table)
    }
}
