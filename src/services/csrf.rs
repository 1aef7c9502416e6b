//! CSRF double-submit secrets.
//!
//! Each browser session is identified by an opaque `sid` (httpOnly cookie).
//! The session's secret lives server-side in the cache and is mirrored into a
//! script-readable cookie; mutating requests must echo it in a header.

use std::{sync::Arc, time::Duration};
use subtle::{Choice, ConstantTimeEq};
use thiserror::Error;

use crate::services::cache::{CacheClient, CacheError};
use crate::services::random::{is_token_shaped, random_token};

#[derive(Debug, Error)]
pub enum CsrfError {
    #[error("csrf token missing or mismatched")]
    Rejected,
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("secure random source failed: {0}")]
    Random(#[from] getrandom::Error),
}

/// A browser session and its CSRF secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfSession {
    pub sid: String,
    pub secret: String,
}

/// Constant-time equality of two secrets.
///
/// Length is not secret (every secret is 43 chars), so a length mismatch
/// short-circuits; equal-length inputs are compared without early exit.
pub fn secret_eq(expected: &str, provided: &str) -> Choice {
    let expected = expected.as_bytes();
    let provided = provided.as_bytes();
    if expected.len() != provided.len() {
        return Choice::from(0);
    }
    expected.ct_eq(provided)
}

pub fn tokens_match(expected: &str, provided: &str) -> bool {
    secret_eq(expected, provided).into()
}

#[derive(Clone)]
pub struct CsrfService<C: CacheClient> {
    cache: Arc<C>,
    ttl: Duration,
}

impl<C: CacheClient> CsrfService<C> {
    pub fn new(cache: Arc<C>, ttl_seconds: u64) -> Self {
        Self {
            cache,
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    fn key(sid: &str) -> String {
        format!("csrf:{}", sid)
    }

    /// Mint a new session id and secret.
    pub async fn issue(&self) -> Result<CsrfSession, CsrfError> {
        let session = CsrfSession {
            sid: random_token()?,
            secret: random_token()?,
        };
        self.cache
            .set_with_ttl(&Self::key(&session.sid), &session.secret, self.ttl)
            .await?;
        Ok(session)
    }

    pub async fn secret_for(&self, sid: &str) -> Result<Option<String>, CsrfError> {
        // Never let client-chosen strings address arbitrary cache keys
        if !is_token_shaped(sid) {
            return Ok(None);
        }
        Ok(self.cache.get_string(&Self::key(sid)).await?)
    }

    /// Existing session for `sid`, or a freshly minted one.
    ///
    /// The returned flag is `true` when a new session was minted.
    pub async fn ensure(&self, sid: Option<&str>) -> Result<(CsrfSession, bool), CsrfError> {
        if let Some(sid) = sid
            && let Some(secret) = self.secret_for(sid).await?
        {
            return Ok((
                CsrfSession {
                    sid: sid.to_string(),
                    secret,
                },
                false,
            ));
        }
        Ok((self.issue().await?, true))
    }

    /// Drop the old session (if any) and mint a new one. Used at login.
    pub async fn rotate(&self, old_sid: Option<&str>) -> Result<CsrfSession, CsrfError> {
        if let Some(sid) = old_sid {
            self.revoke(sid).await?;
        }
        self.issue().await
    }

    pub async fn revoke(&self, sid: &str) -> Result<(), CsrfError> {
        if is_token_shaped(sid) {
            self.cache.del(&Self::key(sid)).await?;
        }
        Ok(())
    }

    /// Missing session, missing header and wrong value are one error.
    pub async fn verify(&self, sid: Option<&str>, provided: Option<&str>) -> Result<(), CsrfError> {
        let (Some(sid), Some(provided)) = (sid, provided) else {
            return Err(CsrfError::Rejected);
        };
        let Some(expected) = self.secret_for(sid).await? else {
            return Err(CsrfError::Rejected);
        };
        if tokens_match(&expected, provided) {
            Ok(())
        } else {
            Err(CsrfError::Rejected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::MemoryCache;

    fn service() -> CsrfService<MemoryCache> {
        CsrfService::new(Arc::new(MemoryCache::new()), 3600)
    }

    #[test]
    fn test_same_secret_matches() {
        let s = random_token().unwrap();
        assert!(tokens_match(&s, &s.clone()));
    }

    #[test]
    fn test_every_single_bit_flip_fails() {
        let s = random_token().unwrap();
        let bytes = s.as_bytes();
        for i in 0..bytes.len() {
            for bit in 0..8 {
                let mut flipped = bytes.to_vec();
                flipped[i] ^= 1 << bit;
                let Ok(flipped) = String::from_utf8(flipped) else {
                    continue;
                };
                assert!(!tokens_match(&s, &flipped), "byte {i} bit {bit}");
            }
        }
    }

    #[test]
    fn test_comparison_is_a_subtle_choice() {
        // The comparison result is a `subtle::Choice`, not a short-circuiting bool.
        let s = random_token().unwrap();
        let choice: Choice = secret_eq(&s, &s);
        assert_eq!(choice.unwrap_u8(), 1);
        assert_eq!(secret_eq(&s, "").unwrap_u8(), 0);
    }

    #[tokio::test]
    async fn test_verify_accepts_issued_secret() {
        let csrf = service();
        let session = csrf.issue().await.unwrap();
        csrf.verify(Some(&session.sid), Some(&session.secret))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_and_wrong_values_are_the_same_error() {
        let csrf = service();
        let session = csrf.issue().await.unwrap();
        let other = csrf.issue().await.unwrap();

        for (sid, provided) in [
            (None, Some(session.secret.as_str())),
            (Some(session.sid.as_str()), None),
            (Some(session.sid.as_str()), Some(other.secret.as_str())),
            (Some("forged-sid"), Some(session.secret.as_str())),
        ] {
            assert!(matches!(
                csrf.verify(sid, provided).await,
                Err(CsrfError::Rejected)
            ));
        }
    }

    #[tokio::test]
    async fn test_ensure_reuses_existing_session() {
        let csrf = service();
        let (first, minted) = csrf.ensure(None).await.unwrap();
        assert!(minted);
        let (again, minted) = csrf.ensure(Some(&first.sid)).await.unwrap();
        assert!(!minted);
        assert_eq!(again, first);
    }

    #[tokio::test]
    async fn test_rotate_invalidates_previous_session() {
        let csrf = service();
        let old = csrf.issue().await.unwrap();
        let new = csrf.rotate(Some(&old.sid)).await.unwrap();

        assert_ne!(old.secret, new.secret);
        assert!(csrf.secret_for(&old.sid).await.unwrap().is_none());
        csrf.verify(Some(&new.sid), Some(&new.secret)).await.unwrap();
    }
}
