//! Cookie names and attributes for the session protocol.
//!
//! `accessToken`, `refreshToken` and `sid` are httpOnly. `csrfToken` and
//! `accessTokenExpiresAt` are readable by same-origin script. All of them are
//! `SameSite=Strict`, path `/`, and `Secure` outside development.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::config::Config;
use crate::services::auth::TokenPair;
use crate::services::csrf::CsrfSession;

pub const ACCESS_TOKEN: &str = "accessToken";
pub const REFRESH_TOKEN: &str = "refreshToken";
pub const ACCESS_EXPIRES_AT: &str = "accessTokenExpiresAt";
pub const CSRF_TOKEN: &str = "csrfToken";
pub const SESSION_ID: &str = "sid";

pub const CSRF_HEADER: &str = "x-csrf-token";

#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub secure: bool,
    pub access_max_age_seconds: u64,
    pub refresh_max_age_seconds: u64,
    pub csrf_max_age_seconds: u64,
}

impl From<&Config> for CookiePolicy {
    fn from(config: &Config) -> Self {
        Self {
            secure: config.secure_cookies(),
            access_max_age_seconds: config.access_token_ttl_seconds,
            refresh_max_age_seconds: config.refresh_token_ttl_seconds,
            csrf_max_age_seconds: config.csrf_ttl_seconds,
        }
    }
}

impl CookiePolicy {
    fn build(
        &self,
        name: &'static str,
        value: String,
        http_only: bool,
        max_age_seconds: u64,
    ) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(http_only)
            .same_site(SameSite::Strict)
            .secure(self.secure)
            .max_age(time::Duration::seconds(max_age_seconds as i64))
            .build()
    }

    pub fn with_token_pair(&self, jar: CookieJar, pair: &TokenPair) -> CookieJar {
        jar.add(self.build(
            ACCESS_TOKEN,
            pair.access.token.clone(),
            true,
            self.access_max_age_seconds,
        ))
        .add(self.build(
            REFRESH_TOKEN,
            pair.refresh.token.clone(),
            true,
            self.refresh_max_age_seconds,
        ))
        .add(self.build(
            ACCESS_EXPIRES_AT,
            pair.access.expires_at.timestamp_millis().to_string(),
            false,
            self.access_max_age_seconds,
        ))
    }

    pub fn with_csrf_session(&self, jar: CookieJar, session: &CsrfSession) -> CookieJar {
        jar.add(self.build(
            SESSION_ID,
            session.sid.clone(),
            true,
            self.csrf_max_age_seconds,
        ))
        .add(self.build(
            CSRF_TOKEN,
            session.secret.clone(),
            false,
            self.csrf_max_age_seconds,
        ))
    }
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

pub fn without_auth(jar: CookieJar) -> CookieJar {
    jar.remove(removal(ACCESS_TOKEN))
        .remove(removal(REFRESH_TOKEN))
        .remove(removal(ACCESS_EXPIRES_AT))
}

pub fn without_csrf_session(jar: CookieJar) -> CookieJar {
    jar.remove(removal(SESSION_ID)).remove(removal(CSRF_TOKEN))
}

pub fn value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
