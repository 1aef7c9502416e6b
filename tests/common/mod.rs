#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderValue, Method, Request, Response, StatusCode, header},
};
use axum_extra::extract::cookie::Cookie;
use parking_lot::Mutex;
use portal_auth::{
    api::{self, RouteBuilder},
    app::build_app_with_routes,
    client::{ApiRequest, ApiResponse, HttpTransport, TransportError},
    config::{AppEnv, Config},
    permissions::{Action, Permission, Resource, Role},
    services::{
        auth::password::hash_password,
        cache::{CacheBackend, MemoryCache},
        directory::{MemoryDirectory, SeedUser},
    },
};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, OnceLock},
    time::Duration,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct horse battery staple";
pub const TWO_FACTOR_CODE: &str = "424242";

pub const ADMIN_EMAIL: &str = "admin@portal.test";
pub const VIEWER_EMAIL: &str = "viewer@portal.test";
pub const UNVERIFIED_EMAIL: &str = "unverified@portal.test";
pub const TWO_FACTOR_EMAIL: &str = "2fa@portal.test";

pub const ADMIN_ROLE_ID: Uuid = Uuid::from_u128(0xa1);
pub const VIEWER_ROLE_ID: Uuid = Uuid::from_u128(0xb2);

pub fn test_config() -> Config {
    Config {
        addr: "127.0.0.1:0".parse().unwrap(),
        app_env: AppEnv::Development,
        cors_allowed_origins: vec![],
        issuer: "portal-auth-test".to_string(),
        audience: "portal-admin".to_string(),
        access_token_secret: "access-secret-for-integration-tests-0123456789".to_string(),
        refresh_token_secret: "refresh-secret-for-integration-tests-9876543210".to_string(),
        access_token_ttl_seconds: 600,
        refresh_token_ttl_seconds: 3600,
        access_token_leeway_seconds: 0,
        csrf_ttl_seconds: 3600,
        login_max_attempts: 3,
        login_lockout_seconds: 900,
        valkey_url: None,
        user_directory_file: None,
    }
}

fn resource(name: &str) -> Resource {
    name.parse().unwrap()
}

pub fn admin_role() -> Role {
    Role {
        id: ADMIN_ROLE_ID,
        role_name: "Admin".to_string(),
        permissions: vec![
            Permission::new(
                resource("sectors"),
                [Action::Read, Action::Create, Action::Update, Action::Delete],
            ),
            Permission::new(resource("users"), [Action::Read, Action::Update]),
            Permission::new(resource("roles"), [Action::Read]),
            Permission::new(resource("clients"), [Action::Read, Action::Export]),
        ],
    }
}

pub fn viewer_role() -> Role {
    Role {
        id: VIEWER_ROLE_ID,
        role_name: "Viewer".to_string(),
        permissions: vec![
            Permission::new(resource("sectors"), [Action::Read]),
            Permission::new(resource("clients"), [Action::Read]),
        ],
    }
}

// Argon2 is slow in debug builds; every fixture user shares one hash.
fn password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).unwrap()).clone()
}

fn seed_user(n: u128, email: &str, role_id: Uuid, verified: bool, code: Option<&str>) -> SeedUser {
    SeedUser {
        id: Uuid::from_u128(n),
        email: email.to_string(),
        first_name: "Test".to_string(),
        last_name: format!("User{n}"),
        password_hash: password_hash(),
        email_verified: verified,
        role_id,
        two_factor_code: code.map(str::to_string),
    }
}

pub fn directory() -> MemoryDirectory {
    MemoryDirectory::new(
        vec![admin_role(), viewer_role()],
        vec![
            seed_user(1, ADMIN_EMAIL, ADMIN_ROLE_ID, true, None),
            seed_user(2, VIEWER_EMAIL, VIEWER_ROLE_ID, true, None),
            seed_user(3, UNVERIFIED_EMAIL, VIEWER_ROLE_ID, false, None),
            seed_user(4, TWO_FACTOR_EMAIL, VIEWER_ROLE_ID, true, Some(TWO_FACTOR_CODE)),
        ],
    )
    .unwrap()
}

pub fn test_app() -> Router {
    test_app_with(api::routes())
}

pub fn test_app_with(routes: RouteBuilder) -> Router {
    build_app_with_routes(
        &test_config(),
        CacheBackend::Memory(MemoryCache::new()),
        Arc::new(directory()),
        routes,
    )
}

/// Minimal browser cookie store: applies `Set-Cookie`, honours removals.
#[derive(Debug, Default, Clone)]
pub struct Cookies(BTreeMap<String, String>);

impl Cookies {
    pub fn absorb<B>(&mut self, response: &Response<B>) {
        for raw in response.headers().get_all(header::SET_COOKIE) {
            let Ok(raw) = raw.to_str() else { continue };
            let Ok(cookie) = Cookie::parse(raw.to_string()) else {
                continue;
            };
            let removed = cookie.value().is_empty()
                || cookie.max_age().is_some_and(|age| age.is_zero());
            if removed {
                self.0.remove(cookie.name());
            } else {
                self.0
                    .insert(cookie.name().to_string(), cookie.value().to_string());
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.0.insert(name.to_string(), value.to_string());
    }

    pub fn remove(&mut self, name: &str) {
        self.0.remove(name);
    }

    pub fn header(&self) -> Option<HeaderValue> {
        if self.0.is_empty() {
            return None;
        }
        let joined = self
            .0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&joined).ok()
    }
}

/// Names set (not removed) by a response.
pub fn set_cookie_names<B>(response: &Response<B>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| Cookie::parse(v.to_string()).ok())
        .filter(|c| !c.value().is_empty())
        .map(|c| c.name().to_string())
        .collect()
}

pub fn request(
    method: Method,
    uri: &str,
    cookies: &Cookies,
    csrf: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookies.header() {
        builder = builder.header(header::COOKIE, cookie);
    }
    if let Some(token) = csrf {
        builder = builder.header("x-csrf-token", token);
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn send(app: &Router, cookies: &mut Cookies, req: Request<Body>) -> Response<Body> {
    let response = app.clone().oneshot(req).await.unwrap();
    cookies.absorb(&response);
    response
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn login_body(email: &str, password: &str) -> Value {
    serde_json::json!({ "email": email, "password": password })
}

/// Log in through the HTTP surface and return the browser's cookies.
pub async fn login(app: &Router, email: &str) -> Cookies {
    let mut cookies = Cookies::default();
    let req = request(
        Method::POST,
        "/auth/login",
        &cookies,
        None,
        Some(login_body(email, PASSWORD)),
    );
    let response = send(app, &mut cookies, req).await;
    assert_eq!(response.status(), StatusCode::OK);
    cookies
}

/// [`HttpTransport`] that drives the router in-process, with a cookie store
/// and a fixed artificial latency so concurrent calls overlap.
pub struct InProcessTransport {
    app: Router,
    latency: Duration,
    cookies: Mutex<Cookies>,
    calls: Mutex<Vec<(Method, String)>>,
    failing: Mutex<HashSet<String>>,
    stalled: Mutex<HashSet<String>>,
}

impl InProcessTransport {
    pub fn new(app: Router, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            app,
            latency,
            cookies: Mutex::new(Cookies::default()),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            stalled: Mutex::new(HashSet::new()),
        })
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().iter().filter(|(_, p)| p == path).count()
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.lock().get(name).map(str::to_string)
    }

    pub fn set_cookie(&self, name: &str, value: &str) {
        self.cookies.lock().set(name, value);
    }

    pub fn remove_cookie(&self, name: &str) {
        self.cookies.lock().remove(name);
    }

    /// Calls to `path` fail with a network error.
    pub fn fail(&self, path: &str) {
        self.failing.lock().insert(path.to_string());
    }

    /// Calls to `path` never complete.
    pub fn stall(&self, path: &str) {
        self.stalled.lock().insert(path.to_string());
    }
}

#[async_trait]
impl HttpTransport for InProcessTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.calls
            .lock()
            .push((request.method.clone(), request.path.clone()));
        tokio::time::sleep(self.latency).await;

        let failing = self.failing.lock().contains(&request.path);
        if failing {
            return Err(TransportError::Network("connection reset".to_string()));
        }
        let stalled = self.stalled.lock().contains(&request.path);
        if stalled {
            std::future::pending::<()>().await;
        }

        let mut builder = Request::builder()
            .method(request.method)
            .uri(request.path.as_str());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        let cookie_header = self.cookies.lock().header();
        if let Some(cookie) = cookie_header {
            builder = builder.header(header::COOKIE, cookie);
        }
        let req = match request.body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let response = self
            .app
            .clone()
            .oneshot(req)
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        self.cookies.lock().absorb(&response);

        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(ApiResponse::new(status, body.to_vec()))
    }

    fn csrf_token(&self) -> Option<String> {
        self.cookie("csrfToken")
    }
}
