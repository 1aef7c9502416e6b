use async_trait::async_trait;
use std::time::Duration;

use crate::services::cache::client::{CacheClient, CacheResult};
use crate::services::cache::{MemoryCache, ValkeyClient};

/// The cache selected at startup.
///
/// `CacheClient` is not object safe (`Clone` bound), so the application state
/// holds this enum and services stay generic over `C: CacheClient`.
#[derive(Clone, Debug)]
pub enum CacheBackend {
    Valkey(ValkeyClient),
    Memory(MemoryCache),
}

#[async_trait]
impl CacheClient for CacheBackend {
    fn backend_name(&self) -> &'static str {
        match self {
            Self::Valkey(c) => c.backend_name(),
            Self::Memory(c) => c.backend_name(),
        }
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        match self {
            Self::Valkey(c) => c.get_string(key).await,
            Self::Memory(c) => c.get_string(key).await,
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        match self {
            Self::Valkey(c) => c.set_with_ttl(key, value, ttl).await,
            Self::Memory(c) => c.set_with_ttl(key, value, ttl).await,
        }
    }

    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<bool> {
        match self {
            Self::Valkey(c) => c.set_if_absent_with_ttl(key, value, ttl).await,
            Self::Memory(c) => c.set_if_absent_with_ttl(key, value, ttl).await,
        }
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> CacheResult<u64> {
        match self {
            Self::Valkey(c) => c.incr_with_ttl(key, ttl).await,
            Self::Memory(c) => c.incr_with_ttl(key, ttl).await,
        }
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        match self {
            Self::Valkey(c) => c.del(key).await,
            Self::Memory(c) => c.del(key).await,
        }
    }
}
