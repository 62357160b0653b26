//! HTTP error mapping for the dialog service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Signed out or token rejected (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Unknown dialog or return session (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Operation not allowed in the current phase (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backend or hub failed (502)
    #[error("Upstream error: {0}")]
    BadGateway(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Backend(_) | Error::Network(_) | Error::Hub(_) | Error::Protocol(_) => {
                ApiError::BadGateway(err.to_string())
            }
            Error::DialogNotFound(_) | Error::ReturnNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            Error::InvalidState(msg) => ApiError::Conflict(msg),
            Error::BadRequest(msg) => ApiError::BadRequest(msg),
            Error::Common(common) => match common {
                lms_common::Error::Unauthenticated(msg) => ApiError::Unauthorized(msg),
                lms_common::Error::NotFound(msg) => ApiError::NotFound(msg),
                lms_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
                other => ApiError::Internal(other.to_string()),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
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
