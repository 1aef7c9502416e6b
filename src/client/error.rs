use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use super::transport::{ApiResponse, TransportError};

#[derive(Debug, Error)]
pub enum ClientError {
    /// No session, or it could not be refreshed. Sign in again.
    #[error("not signed in")]
    Unauthenticated,

    /// Signed in but not allowed. Refreshing will not help.
    #[error("{0}")]
    Forbidden(String),

    #[error("too many login attempts, try again later")]
    TooManyAttempts,

    #[error("unexpected response status {0}")]
    Http(StatusCode),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl ClientError {
    /// Map a non-success response.
    pub(crate) fn from_response(response: &ApiResponse) -> Self {
        match response.status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthenticated,
            StatusCode::FORBIDDEN => {
                let message = response
                    .json::<ErrorEnvelope>()
                    .map(|e| e.error.message)
                    .unwrap_or_else(|_| "Forbidden".to_string());
                ClientError::Forbidden(message)
            }
            StatusCode::TOO_MANY_REQUESTS => ClientError::TooManyAttempts,
            status => ClientError::Http(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_carries_server_message() {
        let response = ApiResponse::new(
            StatusCode::FORBIDDEN,
            r#"{"error":{"code":"CSRF_REJECTED","message":"Forbidden: invalid or missing CSRF token"}}"#,
        );
        match ClientError::from_response(&response) {
            ClientError::Forbidden(msg) => {
                assert_eq!(msg, "Forbidden: invalid or missing CSRF token")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_status_mapping() {
        let unauth = ApiResponse::new(StatusCode::UNAUTHORIZED, "");
        assert!(matches!(
            ClientError::from_response(&unauth),
            ClientError::Unauthenticated
        ));

        let garbled = ApiResponse::new(StatusCode::FORBIDDEN, "nope");
        assert!(matches!(
            ClientError::from_response(&garbled),
            ClientError::Forbidden(m) if m == "Forbidden"
        ));

        let teapot = ApiResponse::new(StatusCode::IM_A_TEAPOT, "");
        assert!(matches!(
            ClientError::from_response(&teapot),
            ClientError::Http(StatusCode::IM_A_TEAPOT)
        ));
    }
}
