use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{FromRedisValue, RedisError};
use std::time::Duration;

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

/// Valkey/Redis-backed cache; shared by every replica of the service.
#[derive(Clone)]
pub struct ValkeyClient {
    manager: ConnectionManager,
}

impl std::fmt::Debug for ValkeyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValkeyClient").finish_non_exhaustive()
    }
}

fn connection_error(e: RedisError) -> CacheError {
    CacheError::BackendConnection(e.to_string())
}

fn command_error(e: RedisError) -> CacheError {
    CacheError::BackendCommand(e.to_string())
}

// EX takes whole seconds; anything shorter still lives one second.
fn ex_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

impl ValkeyClient {
    /// Connect to `redis://host:port[/db]`.
    pub async fn new(url: &str) -> Result<Self, CacheError> {
        let manager = redis::Client::open(url)
            .map_err(connection_error)?
            .get_connection_manager()
            .await
            .map_err(connection_error)?;
        Ok(Self { manager })
    }

    async fn run<T: FromRedisValue>(&self, cmd: &redis::Cmd) -> CacheResult<T> {
        // ConnectionManager clones share one multiplexed connection.
        let mut conn = self.manager.clone();
        cmd.query_async(&mut conn).await.map_err(command_error)
    }
}

#[async_trait]
impl CacheClient for ValkeyClient {
    fn backend_name(&self) -> &'static str {
        "valkey"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        self.run(redis::cmd("GET").arg(key)).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.run(
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(ex_seconds(ttl)),
        )
        .await
    }

    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<bool> {
        // `OK` when written, nil when the key already existed.
        let reply: Option<String> = self
            .run(
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("EX")
                    .arg(ex_seconds(ttl)),
            )
            .await?;
        Ok(reply.is_some())
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> CacheResult<u64> {
        let mut conn = self.manager.clone();

        // EXPIRE NX only arms the TTL on the first increment of a window.
        let (count, _armed): (u64, i64) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(key)
            .cmd("EXPIRE")
            .arg(key)
            .arg(ex_seconds(ttl))
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;

        Ok(count)
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        self.run(redis::cmd("DEL").arg(key)).await
    }
}
