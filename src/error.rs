use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// HTTP-facing error.
///
/// Messages are deliberately generic: callers learn the category of failure,
/// never which credential check failed.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthenticated: invalid or expired token")]
    Unauthenticated,

    #[error("Forbidden: insufficient permissions")]
    Forbidden,

    #[error("Forbidden: invalid or missing CSRF token")]
    CsrfRejected,

    // Reported to the caller exactly like `Unauthenticated`.
    #[error("Unauthenticated: invalid or expired token")]
    ReplayDetected,

    #[error("too many login attempts, try again later")]
    TooManyAttempts,

    #[error("internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorResponseBody {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        self.parts().0
    }

    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Unauthenticated | AppError::ReplayDetected => {
                (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED")
            }
            AppError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::CsrfRejected => (StatusCode::FORBIDDEN, "CSRF_REJECTED"),
            AppError::TooManyAttempts => (StatusCode::TOO_MANY_REQUESTS, "TOO_MANY_ATTEMPTS"),
            AppError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();

        let body = ErrorResponseBody {
            error: ErrorBody {
                code,
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_is_indistinguishable_from_unauthenticated() {
        assert_eq!(
            AppError::ReplayDetected.status(),
            AppError::Unauthenticated.status()
        );
        assert_eq!(
            AppError::ReplayDetected.to_string(),
            AppError::Unauthenticated.to_string()
        );
        assert_eq!(
            AppError::ReplayDetected.parts().1,
            AppError::Unauthenticated.parts().1
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::CsrfRejected.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::TooManyAttempts.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
