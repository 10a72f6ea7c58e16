use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use chatbox_core::ErrorBody;

/// Failures reported before any frame has been written.
///
/// Once streaming starts, errors travel in-band as `[ERROR]` frames instead.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Message is required and must be a string")]
    InvalidMessage,

    #[error("Streaming failed")]
    StreamingFailed,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidMessage => StatusCode::BAD_REQUEST,
            ApiError::StreamingFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
