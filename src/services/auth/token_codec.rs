use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;

/// The authenticated identity embedded in an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Wire claims shared by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub role: String,
    pub typ: TokenKind,
    pub iat: u64,
    pub exp: u64,
    pub jti: String,
    // Refresh tokens only: rotation lineage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fam: Option<String>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("jwt verification failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("unexpected token type")]
    WrongKind,
    #[error("empty '{0}' claim")]
    EmptyClaim(&'static str),
    #[error("invalid '{0}' claim (expected UUID)")]
    InvalidUuid(&'static str),
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct VerifiedAccess {
    pub principal: Principal,
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct VerifiedRefresh {
    pub principal: Principal,
    pub jti: String,
    pub family: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenSettings {
    pub issuer: String,
    pub audience: String,
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_seconds: u64,
    pub refresh_ttl_seconds: u64,
    pub leeway_seconds: u64,
}

impl From<&Config> for TokenSettings {
    fn from(config: &Config) -> Self {
        Self {
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_secret: config.access_token_secret.clone(),
            refresh_secret: config.refresh_token_secret.clone(),
            access_ttl_seconds: config.access_token_ttl_seconds,
            refresh_ttl_seconds: config.refresh_token_ttl_seconds,
            leeway_seconds: config.access_token_leeway_seconds,
        }
    }
}

#[derive(Clone)]
struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Signs and verifies access and refresh tokens (HS256).
///
/// Access and refresh tokens are signed with different secrets and carry a
/// `typ` claim, so one kind can never be replayed as the other.
#[derive(Clone)]
pub struct TokenCodec {
    issuer: String,
    audience: String,
    access: Keys,
    refresh: Keys,
    access_ttl_seconds: u64,
    refresh_ttl_seconds: u64,
    validation: Validation,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .finish()
    }
}

impl TokenCodec {
    pub fn new(settings: TokenSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_audience(&[settings.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = settings.leeway_seconds;

        Self {
            access: Keys::from_secret(&settings.access_secret),
            refresh: Keys::from_secret(&settings.refresh_secret),
            issuer: settings.issuer,
            audience: settings.audience,
            access_ttl_seconds: settings.access_ttl_seconds,
            refresh_ttl_seconds: settings.refresh_ttl_seconds,
            validation,
        }
    }

    pub fn issue_access_at(
        &self,
        principal: Principal,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        self.sign(TokenKind::Access, principal, None, now)
    }

    pub fn issue_refresh_at(
        &self,
        principal: Principal,
        family: Uuid,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        self.sign(TokenKind::Refresh, principal, Some(family), now)
    }

    fn sign(
        &self,
        kind: TokenKind,
        principal: Principal,
        family: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let (keys, ttl) = match kind {
            TokenKind::Access => (&self.access, self.access_ttl_seconds),
            TokenKind::Refresh => (&self.refresh, self.refresh_ttl_seconds),
        };
        let expires_at = now + ChronoDuration::seconds(ttl as i64);
        let jti = Uuid::new_v4().to_string();

        let claims = TokenClaims {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            sub: principal.id.to_string(),
            role: principal.role_id.to_string(),
            typ: kind,
            iat: now.timestamp().max(0) as u64,
            exp: expires_at.timestamp().max(0) as u64,
            jti: jti.clone(),
            fam: family.map(|f| f.to_string()),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());
        let token = jsonwebtoken::encode(&header, &claims, &keys.encoding)?;

        Ok(IssuedToken {
            token,
            jti,
            expires_at,
        })
    }

    fn decode(&self, kind: TokenKind, token: &str) -> Result<TokenClaims, TokenError> {
        let keys = match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        };
        let claims =
            jsonwebtoken::decode::<TokenClaims>(token, &keys.decoding, &self.validation)?.claims;

        if claims.typ != kind {
            return Err(TokenError::WrongKind);
        }
        if claims.jti.trim().is_empty() {
            return Err(TokenError::EmptyClaim("jti"));
        }
        Ok(claims)
    }

    fn principal(claims: &TokenClaims) -> Result<Principal, TokenError> {
        Ok(Principal {
            id: Uuid::parse_str(&claims.sub).map_err(|_| TokenError::InvalidUuid("sub"))?,
            role_id: Uuid::parse_str(&claims.role).map_err(|_| TokenError::InvalidUuid("role"))?,
        })
    }

    /// Verify signature, `iss`/`aud`/`exp` and token kind, then lift the
    /// claims into a [`Principal`].
    pub fn verify_access(&self, token: &str) -> Result<VerifiedAccess, TokenError> {
        let claims = self.decode(TokenKind::Access, token)?;
        Ok(VerifiedAccess {
            principal: Self::principal(&claims)?,
            jti: claims.jti,
        })
    }

    pub fn verify_refresh(&self, token: &str) -> Result<VerifiedRefresh, TokenError> {
        let claims = self.decode(TokenKind::Refresh, token)?;
        let family = claims
            .fam
            .as_deref()
            .ok_or(TokenError::EmptyClaim("fam"))
            .and_then(|f| Uuid::parse_str(f).map_err(|_| TokenError::InvalidUuid("fam")))?;
        let expires_at =
            DateTime::<Utc>::from_timestamp(claims.exp as i64, 0).ok_or(TokenError::EmptyClaim("exp"))?;

        Ok(VerifiedRefresh {
            principal: Self::principal(&claims)?,
            jti: claims.jti,
            family,
            expires_at,
        })
    }
}
