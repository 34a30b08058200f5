//! API error type with HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to API clients.
///
/// Every variant maps to a status code and serializes as
/// `{"error": <kind>, "message": <detail>}`; nothing beyond the message
/// leaks to the client.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Run '{run_id}' not found")]
    RunNotFound { run_id: String },

    #[error("Failed to create run: {reason}")]
    RunCreationFailed { reason: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl ApiError {
    pub fn run_not_found(run_id: impl Into<String>) -> Self {
        ApiError::RunNotFound {
            run_id: run_id.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::RunNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::RunCreationFailed { .. } => StatusCode::BAD_REQUEST,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::RunNotFound { .. } => "not_found",
            ApiError::RunCreationFailed { .. } => "bad_request",
            ApiError::Internal { .. } => "internal_error",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(%self, "request failed");
        }
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
