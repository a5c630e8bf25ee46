//! Error types for meateye-fridge HTTP handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Rejected input (422)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Missing or malformed member identity (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller does not own the resource (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// meateye-common error
    #[error("Common error: {0}")]
    Common(#[from] meateye_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use meateye_common::Error as CommonError;

        let (status, error_code, message) = match self {
            ApiError::Validation(msg) | ApiError::Common(CommonError::Validation(msg)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", msg)
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Forbidden(msg) | ApiError::Common(CommonError::Forbidden(msg)) => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", msg)
            }
            ApiError::NotFound(msg) | ApiError::Common(CommonError::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg)
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(err) => {
                tracing::error!(error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR", err.to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
