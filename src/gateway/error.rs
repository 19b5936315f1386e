//! Gateway error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::broker::LinkError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// A command could not reach the broker.
    #[error(transparent)]
    Broker(#[from] LinkError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Broker(LinkError::NotConnected) => {
                (StatusCode::SERVICE_UNAVAILABLE, "BROKER_DOWN")
            }
            ApiError::Broker(_) => (StatusCode::BAD_GATEWAY, "PUBLISH_FAILED"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        tracing::error!(error_code = code, error_message = %self, "request failed");

        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for gateway handlers.
pub type ApiResult<T> = Result<T, ApiError>;
