// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Covers the exam lifecycle failures as well as the HTTP-only ones,
/// and maps each of them to a JSON response.
#[derive(Debug)]
pub enum AppError {
    // 404 Not Found: exam set, question or attempt absent
    NotFound(String),

    // 409 Conflict: exam set exists but is closed for attempts
    InactiveExam(String),

    // 422 Unprocessable Entity: exam set has no questions
    EmptyExam(String),

    // 409 Conflict: operation outside its lifecycle state
    InvalidState(String),

    // 503 Service Unavailable: storage or network failure, retryable
    Persistence(String),

    // 401 Unauthorized
    AuthenticationRequired(String),

    // 403 Forbidden
    Forbidden(String),

    // 400 Bad Request
    BadRequest(String),

    // 409 Conflict (e.g., duplicate username)
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),
}

impl AppError {
    /// Whether the caller may simply repeat the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Persistence(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "not found: {}", msg),
            AppError::InactiveExam(msg) => write!(f, "exam is not active: {}", msg),
            AppError::EmptyExam(msg) => write!(f, "exam has no questions: {}", msg),
            AppError::InvalidState(msg) => write!(f, "invalid state: {}", msg),
            AppError::Persistence(msg) => write!(f, "persistence error: {}", msg),
            AppError::AuthenticationRequired(msg) => {
                write!(f, "authentication required: {}", msg)
            }
            AppError::Forbidden(msg) => write!(f, "forbidden: {}", msg),
            AppError::BadRequest(msg) => write!(f, "bad request: {}", msg),
            AppError::Conflict(msg) => write!(f, "conflict: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Storage and internal details are logged, never sent to the client.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retry = self.is_retryable();
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InactiveExam(msg) => (StatusCode::CONFLICT, msg),
            AppError::EmptyExam(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::InvalidState(msg) => (StatusCode::CONFLICT, msg),
            AppError::Persistence(msg) => {
                tracing::error!("Persistence error: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Storage is temporarily unavailable, please retry".to_string(),
                )
            }
            AppError::AuthenticationRequired(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };
        let body = Json(json!({
            "error": error_message,
            "retry": retry,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::Persistence`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            other => AppError::Persistence(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::InactiveExam("x".into()), StatusCode::CONFLICT),
            (AppError::EmptyExam("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (AppError::InvalidState("x".into()), StatusCode::CONFLICT),
            (AppError::Persistence("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (
                AppError::AuthenticationRequired("x".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_only_persistence_is_retryable() {
        assert!(AppError::Persistence("down".into()).is_retryable());
        assert!(!AppError::InvalidState("done".into()).is_retryable());
        assert!(!AppError::EmptyExam("empty".into()).is_retryable());
    }
}
