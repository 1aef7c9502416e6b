use chrono::Utc;
use std::{fmt::Display, sync::Arc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::auth::login_throttle::LoginThrottle;
use crate::services::auth::password::{UNMATCHED_HASH, verify_password};
use crate::services::auth::refresh_store::{ConsumeOutcome, RefreshTokenStore};
use crate::services::auth::token_codec::{IssuedToken, Principal, TokenCodec};
use crate::services::cache::CacheClient;
use crate::services::directory::{UserDirectory, UserRecord};

/// Login form as received from the client.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub two_factor_code: Option<String>,
}

/// An access/refresh pair from one token family.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
    pub family: Uuid,
}

#[derive(Debug)]
pub enum LoginOutcome {
    /// Password accepted; a second factor must be supplied. No tokens issued.
    TwoFactorRequired { user: UserRecord },
    Authenticated { user: UserRecord, tokens: TokenPair },
}

fn internal(what: &'static str, e: impl Display) -> AppError {
    error!(error = %e, "{what}");
    AppError::Internal
}

fn candidate_hash(user: Option<&UserRecord>) -> &str {
    user.map_or(UNMATCHED_HASH, |u| u.password_hash.as_str())
}

/// Mints, rotates and revokes token pairs.
///
/// Access tokens are stateless. Refresh tokens are single-use: every refresh
/// consumes the presented token and issues its successor in the same family;
/// presenting a consumed token revokes the family.
pub struct SessionService<C: CacheClient> {
    tokens: Arc<TokenCodec>,
    store: RefreshTokenStore<C>,
    throttle: LoginThrottle<C>,
    directory: Arc<dyn UserDirectory>,
}

impl<C: CacheClient> std::fmt::Debug for SessionService<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("tokens", &self.tokens)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<C: CacheClient> SessionService<C> {
    pub fn new(
        tokens: Arc<TokenCodec>,
        store: RefreshTokenStore<C>,
        throttle: LoginThrottle<C>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            tokens,
            store,
            throttle,
            directory,
        }
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, AppError> {
        let email = credentials.email.trim();

        if self
            .throttle
            .is_locked(email)
            .await
            .map_err(|e| internal("login throttle lookup failed", e))?
        {
            warn!("login refused: too many failed attempts");
            return Err(AppError::TooManyAttempts);
        }

        let user = self
            .directory
            .find_by_email(email)
            .await
            .map_err(|e| internal("user lookup failed", e))?;

        // Verify even when the e-mail is unknown: response time must not
        // reveal whether an account exists.
        let password_ok = verify_password(candidate_hash(user.as_ref()), &credentials.password);
        let user = match user {
            Some(u) if password_ok => u,
            _ => return Err(self.reject_login(email).await),
        };

        if !user.email_verified {
            debug!(user_id = %user.id, "login refused: e-mail not verified");
            return Err(AppError::Unauthenticated);
        }

        if user.two_factor_enabled {
            let Some(code) = credentials.two_factor_code.as_deref() else {
                debug!(user_id = %user.id, "second factor required");
                return Ok(LoginOutcome::TwoFactorRequired { user });
            };
            let valid = self
                .directory
                .verify_second_factor(user.id, code)
                .await
                .map_err(|e| internal("second factor check failed", e))?;
            if !valid {
                return Err(self.reject_login(email).await);
            }
        }

        self.throttle
            .reset(email)
            .await
            .map_err(|e| internal("login throttle reset failed", e))?;

        let principal = Principal {
            id: user.id,
            role_id: user.role.id,
        };
        let tokens = self.issue_pair(principal, Uuid::new_v4()).await?;
        info!(user_id = %user.id, family = %tokens.family, "login succeeded");

        Ok(LoginOutcome::Authenticated { user, tokens })
    }

    async fn reject_login(&self, email: &str) -> AppError {
        match self.throttle.record_failure(email).await {
            Ok(count) => debug!(failures = count, "login refused: bad credentials"),
            Err(e) => error!(error = %e, "failed to record login failure"),
        }
        AppError::Unauthenticated
    }

    /// Rotate `refresh_token` into a new pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let presented = self.tokens.verify_refresh(refresh_token).map_err(|e| {
            debug!(error = %e, "refresh token verification failed");
            AppError::Unauthenticated
        })?;

        let outcome = self
            .store
            .consume(&presented.jti)
            .await
            .map_err(|e| internal("refresh token store failure", e))?;

        let family = match outcome {
            ConsumeOutcome::Rotated { family } if family == presented.family => family,
            ConsumeOutcome::Rotated { family } | ConsumeOutcome::Replayed { family } => {
                warn!(
                    user_id = %presented.principal.id,
                    family = %family,
                    "refresh token reuse detected, revoking token family"
                );
                self.store
                    .revoke_family(family)
                    .await
                    .map_err(|e| internal("failed to revoke token family", e))?;
                return Err(AppError::ReplayDetected);
            }
            ConsumeOutcome::FamilyRevoked { family } => {
                debug!(family = %family, "refresh refused: family revoked");
                return Err(AppError::Unauthenticated);
            }
            ConsumeOutcome::Unknown => {
                debug!("refresh refused: token not registered");
                return Err(AppError::Unauthenticated);
            }
        };

        // Re-read the user so role changes take effect at the next rotation.
        let user = self
            .directory
            .find_by_id(presented.principal.id)
            .await
            .map_err(|e| internal("user lookup failed", e))?
            .ok_or_else(|| {
                debug!(user_id = %presented.principal.id, "refresh refused: user no longer exists");
                AppError::Unauthenticated
            })?;

        let principal = Principal {
            id: user.id,
            role_id: user.role.id,
        };
        self.issue_pair(principal, family).await
    }

    /// Revoke the family of `refresh_token` when it is still verifiable.
    /// Never fails: logout is idempotent.
    pub async fn logout(&self, refresh_token: Option<&str>) {
        let Some(token) = refresh_token else {
            return;
        };
        let presented = match self.tokens.verify_refresh(token) {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "logout with unverifiable refresh token");
                return;
            }
        };
        match self.store.revoke_family(presented.family).await {
            Ok(()) => info!(user_id = %presented.principal.id, family = %presented.family, "logged out"),
            Err(e) => error!(error = %e, family = %presented.family, "failed to revoke token family on logout"),
        }
    }

    pub async fn current_user(&self, principal: Principal) -> Result<UserRecord, AppError> {
        self.directory
            .find_by_id(principal.id)
            .await
            .map_err(|e| internal("user lookup failed", e))?
            .ok_or(AppError::Unauthenticated)
    }

    async fn issue_pair(&self, principal: Principal, family: Uuid) -> Result<TokenPair, AppError> {
        let now = Utc::now();
        let access = self
            .tokens
            .issue_access_at(principal, now)
            .map_err(|e| internal("failed to sign access token", e))?;
        let refresh = self
            .tokens
            .issue_refresh_at(principal, family, now)
            .map_err(|e| internal("failed to sign refresh token", e))?;

        self.store
            .register(&refresh.jti, family)
            .await
            .map_err(|e| internal("failed to register refresh token", e))?;

        Ok(TokenPair {
            access,
            refresh,
            family,
        })
    }
}
