//! Error types for mg-detect's HTTP surface

use crate::intake::IntakeError;
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
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload exceeds the size ceiling (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Content type or extension not accepted (415)
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Client exceeded its submission budget (429)
    #[error("Too many requests: {0}")]
    RateLimited(String),
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        let message = err.to_string();
        match err {
            IntakeError::Empty | IntakeError::InvalidFilename(_) => ApiError::BadRequest(message),
            IntakeError::TooLarge { .. } => ApiError::PayloadTooLarge(message),
            IntakeError::DisallowedExtension(_) | IntakeError::UnsupportedType(_) => {
                ApiError::UnsupportedMediaType(message)
            }
            IntakeError::RateLimited { .. } => ApiError::RateLimited(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::UnsupportedMediaType(msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_MEDIA_TYPE",
                msg,
            ),
            ApiError::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", msg),
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
