//! Cache seam behind refresh rotation, CSRF secrets and login throttling.
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Kept apart from `AppError`: callers pick the failure mode, and every auth
/// caller here fails closed.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
    #[error("cache value error: {0}")]
    InvalidValue(String),
}

/// A small string-keyed cache with per-key TTLs.
///
/// Implementations must be cheap to clone (an `Arc` or a connection manager
/// inside).
#[async_trait]
pub trait CacheClient: Clone + Send + Sync + 'static {
    /// Short backend label for logs and `/health`.
    fn backend_name(&self) -> &'static str;

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>>;

    /// Write `value`, replacing any previous one.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Write only if `key` is absent; `false` means someone got there first.
    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<bool>;

    /// Increment a counter, returning the new value. The TTL starts with the
    /// first increment and later increments do not extend it.
    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> CacheResult<u64>;

    /// Number of keys removed. Of several callers racing on one key, exactly
    /// one sees `1`.
    async fn del(&self, key: &str) -> CacheResult<u64>;
}
