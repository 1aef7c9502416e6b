use std::{sync::Arc, time::Duration};
use tracing::debug;
use uuid::Uuid;

use crate::services::cache::{CacheClient, CacheError};

/// Result of presenting a refresh token's `jti` for rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// First use: the caller may mint the successor in `family`.
    Rotated { family: Uuid },
    /// The token was already rotated once. Treat as a stolen token.
    Replayed { family: Uuid },
    /// The family was revoked (logout or earlier replay).
    FamilyRevoked { family: Uuid },
    /// Never registered, or expired out of the store.
    Unknown,
}

/// Cache-backed lineage of refresh tokens.
///
/// Keys (under `prefix`):
/// - `live:{jti}` -> family, present until the token is consumed
/// - `used:{jti}` -> family, set when consumed (replay detection)
/// - `revoked:{family}` -> marker, set when the family is revoked
///
/// Every backend error is returned to the caller, which fails closed.
#[derive(Clone)]
pub struct RefreshTokenStore<C: CacheClient> {
    cache: Arc<C>,
    prefix: String,
    ttl: Duration,
}

impl<C: CacheClient> std::fmt::Debug for RefreshTokenStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTokenStore")
            .field("backend", &self.cache.backend_name())
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl<C: CacheClient> RefreshTokenStore<C> {
    pub fn new(cache: Arc<C>, ttl_seconds: u64) -> Self {
        Self {
            cache,
            prefix: "auth:refresh".to_string(),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    fn key(&self, kind: &str, raw: &str) -> String {
        format!("{}:{}:{}", self.prefix, kind, raw)
    }

    /// Record a freshly issued refresh token as the live member of `family`.
    pub async fn register(&self, jti: &str, family: Uuid) -> Result<(), CacheError> {
        let stored = self
            .cache
            .set_if_absent_with_ttl(&self.key("live", jti), &family.to_string(), self.ttl)
            .await?;
        if !stored {
            // jti is a v4 UUID; a collision means something is badly wrong.
            return Err(CacheError::InvalidValue(format!("duplicate refresh jti {jti}")));
        }
        Ok(())
    }

    /// Single-use consumption of `jti`.
    ///
    /// Concurrent consumers of the same token race on `SET NX used:{jti}`;
    /// only the one that writes it rotates, the others see `Replayed`. The
    /// used marker exists before the live key goes away, so a late consumer
    /// always finds one of the two.
    pub async fn consume(&self, jti: &str) -> Result<ConsumeOutcome, CacheError> {
        let live_key = self.key("live", jti);
        let used_key = self.key("used", jti);

        let Some(family) = self.cache.get_string(&live_key).await? else {
            return match self.cache.get_string(&used_key).await? {
                Some(family) => Ok(ConsumeOutcome::Replayed {
                    family: parse_family(&family)?,
                }),
                None => Ok(ConsumeOutcome::Unknown),
            };
        };
        let family = parse_family(&family)?;

        let won = self
            .cache
            .set_if_absent_with_ttl(&used_key, &family.to_string(), self.ttl)
            .await?;
        if !won {
            debug!(family = %family, "refresh token consumed concurrently");
            return Ok(ConsumeOutcome::Replayed { family });
        }
        self.cache.del(&live_key).await?;

        if self.is_family_revoked(family).await? {
            return Ok(ConsumeOutcome::FamilyRevoked { family });
        }

        Ok(ConsumeOutcome::Rotated { family })
    }

    /// Revoke every token of `family`, including any not yet presented.
    pub async fn revoke_family(&self, family: Uuid) -> Result<(), CacheError> {
        self.cache
            .set_with_ttl(&self.key("revoked", &family.to_string()), "1", self.ttl)
            .await
    }

    pub async fn is_family_revoked(&self, family: Uuid) -> Result<bool, CacheError> {
        Ok(self
            .cache
            .get_string(&self.key("revoked", &family.to_string()))
            .await?
            .is_some())
    }
}

fn parse_family(raw: &str) -> Result<Uuid, CacheError> {
    Uuid::parse_str(raw).map_err(|e| CacheError::InvalidValue(e.to_string()))
}
