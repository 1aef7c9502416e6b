use async_trait::async_trait;
use axum_extra::extract::cookie::Cookie;
use reqwest::cookie::{CookieStore, Jar};
use std::{sync::Arc, time::Duration};
use url::Url;

use super::transport::{ApiRequest, ApiResponse, HttpTransport, TransportError};
use crate::api::cookies::CSRF_TOKEN;

/// [`HttpTransport`] over reqwest with an in-process cookie jar.
pub struct ReqwestTransport {
    client: reqwest::Client,
    jar: Arc<Jar>,
    base_url: Url,
}

impl ReqwestTransport {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, TransportError> {
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            client,
            jar,
            base_url,
        })
    }
}

fn map_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self
            .base_url
            .join(&request.path)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let mut builder = self
            .client
            .request(request.method, url)
            .headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_error)?;

        Ok(ApiResponse::new(status, body.to_vec()))
    }

    fn csrf_token(&self) -> Option<String> {
        let header = self.jar.cookies(&self.base_url)?;
        let header = header.to_str().ok()?;
        Cookie::split_parse(header)
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == CSRF_TOKEN)
            .map(|cookie| cookie.value().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csrf_token_reads_from_jar() {
        let base = Url::parse("http://localhost:4000/").unwrap();
        let transport = ReqwestTransport::new(base.clone(), Duration::from_secs(5)).unwrap();
        assert_eq!(transport.csrf_token(), None);

        transport
            .jar
            .add_cookie_str("csrfToken=tok123; Path=/", &base);
        assert_eq!(transport.csrf_token().as_deref(), Some("tok123"));
    }

    #[test]
    fn test_csrf_token_ignores_other_cookies() {
        let base = Url::parse("http://localhost:4000/").unwrap();
        let transport = ReqwestTransport::new(base.clone(), Duration::from_secs(5)).unwrap();
        transport.jar.add_cookie_str("sid=abc; Path=/", &base);
        transport
            .jar
            .add_cookie_str("accessTokenExpiresAt=1700000000000; Path=/", &base);
        assert_eq!(transport.csrf_token(), None);

        transport.jar.add_cookie_str("csrfToken=xyz; Path=/", &base);
        assert_eq!(transport.csrf_token().as_deref(), Some("xyz"));
    }
}
