use axum::Router;
use std::{panic, process, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::error::AppError;
use crate::middleware;
use crate::services::cache::{CacheBackend, MemoryCache, ValkeyClient};
use crate::services::directory::{MemoryDirectory, UserDirectory};
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG wins when set, e.g.
    // RUST_LOG=info,portal_auth=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Surface panics through tracing; stderr may not be collected.
        tracing::error!(?info, "panic");

        // Development: crash loudly. Production: keep serving.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<(), AppError> {
    init_tracing();
    let config = Config::from_env()?;
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting portal auth in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let cache = build_cache(&config).await?;
    let directory = build_directory(&config)?;
    let app = build_app(&config, cache, directory);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, addr = %config.addr, "failed to bind");
            AppError::Internal
        })?;
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!(error = %e, "server error");
        AppError::Internal
    })?;

    Ok(())
}

async fn build_cache(config: &Config) -> Result<CacheBackend, AppError> {
    match &config.valkey_url {
        Some(url) => {
            let client = ValkeyClient::new(url).await.map_err(|e| {
                tracing::error!(error = %e, "failed to connect to valkey");
                AppError::Internal
            })?;
            Ok(CacheBackend::Valkey(client))
        }
        None => {
            if config.app_env.is_production() {
                tracing::warn!(
                    "VALKEY_URL not set: refresh lineage and csrf sessions are process-local"
                );
            }
            Ok(CacheBackend::Memory(MemoryCache::new()))
        }
    }
}

fn build_directory(config: &Config) -> Result<Arc<dyn UserDirectory>, AppError> {
    let directory = match &config.user_directory_file {
        Some(path) => MemoryDirectory::from_file(path).map_err(|e| {
            tracing::error!(error = %e, path = %path, "failed to load user directory");
            AppError::Internal
        })?,
        None => {
            tracing::warn!("USER_DIRECTORY_FILE not set: no user can log in");
            MemoryDirectory::default()
        }
    };
    tracing::info!(users = directory.len(), "user directory loaded");
    Ok(Arc::new(directory))
}

/// Assemble the full application: routes, guards and transport layers.
pub fn build_app(
    config: &Config,
    cache: CacheBackend,
    directory: Arc<dyn UserDirectory>,
) -> Router {
    build_app_with_routes(config, cache, directory, api::routes())
}

/// Same as [`build_app`] with a caller-supplied route set.
pub fn build_app_with_routes(
    config: &Config,
    cache: CacheBackend,
    directory: Arc<dyn UserDirectory>,
    routes: api::RouteBuilder,
) -> Router {
    let (router, table) = routes.build();
    let state = AppState::new(config, cache, directory, table);

    // Layers run bottom-up: the csrf guard sees a request before the auth guard.
    let router = middleware::auth::access::apply(router, state.clone());
    let router = middleware::csrf::apply(router, state.clone());
    let router = router.with_state(state);

    let router = middleware::security_headers::apply(router);
    let router = middleware::cors::apply(router, config);
    middleware::http::apply(router)
}
