use std::net::SocketAddr;
use std::str::FromStr;
use std::{env, fmt};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    // Exact-match origins allowed to send credentialed requests (production)
    pub cors_allowed_origins: Vec<String>,
    pub issuer: String,
    pub audience: String,
    // HS256 secrets; access and refresh tokens never share a key
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    // Token lifetimes (seconds)
    pub access_token_ttl_seconds: u64,
    pub refresh_token_ttl_seconds: u64,
    pub access_token_leeway_seconds: u64,
    pub csrf_ttl_seconds: u64,
    // Login throttling
    pub login_max_attempts: u64,
    pub login_lockout_seconds: u64,
    pub valkey_url: Option<String>,
    pub user_directory_file: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print secrets
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field("refresh_token_ttl_seconds", &self.refresh_token_ttl_seconds)
            .field("valkey_url", &self.valkey_url.is_some())
            .finish()
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(s) => s.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

fn required_secret(key: &'static str) -> Result<String, ConfigError> {
    let value = env::var(key).map_err(|_| ConfigError::Missing(key))?;
    // HS256 keys shorter than the digest size are brute-forceable
    if value.len() < 32 {
        return Err(ConfigError::Invalid(key));
    }
    Ok(value)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = parse_or("PORT", 4000)?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let issuer = env::var("AUTH_ISSUER").map_err(|_| ConfigError::Missing("AUTH_ISSUER"))?;
        let audience =
            env::var("AUTH_AUDIENCE").map_err(|_| ConfigError::Missing("AUTH_AUDIENCE"))?;

        let access_token_secret = required_secret("JWT_ACCESS_SECRET")?;
        let refresh_token_secret = required_secret("JWT_REFRESH_SECRET")?;
        if access_token_secret == refresh_token_secret {
            return Err(ConfigError::Invalid("JWT_REFRESH_SECRET"));
        }

        Ok(Config {
            addr,
            app_env,
            cors_allowed_origins,
            issuer,
            audience,
            access_token_secret,
            refresh_token_secret,
            access_token_ttl_seconds: parse_or("ACCESS_TOKEN_TTL_SECONDS", 600)?, // 10 min
            refresh_token_ttl_seconds: parse_or("REFRESH_TOKEN_TTL_SECONDS", 2_592_000)?, // 30 days
            access_token_leeway_seconds: parse_or("ACCESS_TOKEN_LEEWAY_SECONDS", 30)?,
            csrf_ttl_seconds: parse_or("CSRF_TTL_SECONDS", 3600)?,
            login_max_attempts: parse_or("LOGIN_MAX_ATTEMPTS", 3)?,
            login_lockout_seconds: parse_or("LOGIN_LOCKOUT_SECONDS", 900)?, // 15 min
            valkey_url: env::var("VALKEY_URL").ok().filter(|s| !s.is_empty()),
            user_directory_file: env::var("USER_DIRECTORY_FILE")
                .ok()
                .filter(|s| !s.is_empty()),
        })
    }

    /// Cookies carry the `Secure` attribute outside development.
    pub fn secure_cookies(&self) -> bool {
        self.app_env.is_production()
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        tracing::error!(error = %e, "configuration error");
        AppError::Internal
    }
}
