use std::sync::Arc;

use crate::api::RouteTable;
use crate::api::cookies::CookiePolicy;
use crate::config::Config;
use crate::services::auth::{
    LoginThrottle, RefreshTokenStore, SessionService, TokenCodec, TokenSettings,
};
use crate::services::cache::{CacheBackend, CacheClient};
use crate::services::csrf::CsrfService;
use crate::services::directory::UserDirectory;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionService<CacheBackend>>,
    pub csrf: Arc<CsrfService<CacheBackend>>,
    pub directory: Arc<dyn UserDirectory>,
    pub routes: Arc<RouteTable>,
    pub cookies: CookiePolicy,
    pub cache_backend: &'static str,
}

impl AppState {
    pub fn new(
        config: &Config,
        cache: CacheBackend,
        directory: Arc<dyn UserDirectory>,
        routes: RouteTable,
    ) -> Self {
        let cache_backend = cache.backend_name();
        let cache = Arc::new(cache);
        let tokens = Arc::new(TokenCodec::new(TokenSettings::from(config)));

        let sessions = SessionService::new(
            tokens,
            RefreshTokenStore::new(cache.clone(), config.refresh_token_ttl_seconds),
            LoginThrottle::new(
                cache.clone(),
                config.login_max_attempts,
                config.login_lockout_seconds,
            ),
            directory.clone(),
        );

        Self {
            sessions: Arc::new(sessions),
            csrf: Arc::new(CsrfService::new(cache, config.csrf_ttl_seconds)),
            directory,
            routes: Arc::new(routes),
            cookies: CookiePolicy::from(config),
            cache_backend,
        }
    }
}
