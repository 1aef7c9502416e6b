use sha2::{Digest, Sha256};
use std::{sync::Arc, time::Duration};

use crate::services::cache::{CacheClient, CacheError};

/// Consecutive failed-login counter per e-mail.
///
/// The counter window starts at the first failure and lasts `lockout`; a
/// successful login clears it.
#[derive(Clone)]
pub struct LoginThrottle<C: CacheClient> {
    cache: Arc<C>,
    max_attempts: u64,
    lockout: Duration,
}

impl<C: CacheClient> LoginThrottle<C> {
    pub fn new(cache: Arc<C>, max_attempts: u64, lockout_seconds: u64) -> Self {
        Self {
            cache,
            max_attempts,
            lockout: Duration::from_secs(lockout_seconds),
        }
    }

    // E-mail addresses are hashed so they never appear in cache keys.
    fn key(email: &str) -> String {
        let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
        format!("auth:login-attempts:{}", hex::encode(digest))
    }

    pub async fn is_locked(&self, email: &str) -> Result<bool, CacheError> {
        let Some(raw) = self.cache.get_string(&Self::key(email)).await? else {
            return Ok(false);
        };
        let count: u64 = raw
            .parse()
            .map_err(|_| CacheError::InvalidValue(raw.clone()))?;
        Ok(count >= self.max_attempts)
    }

    /// Returns the failure count after this one.
    pub async fn record_failure(&self, email: &str) -> Result<u64, CacheError> {
        self.cache
            .incr_with_ttl(&Self::key(email), self.lockout)
            .await
    }

    pub async fn reset(&self, email: &str) -> Result<(), CacheError> {
        self.cache.del(&Self::key(email)).await.map(|_| ())
    }
}
