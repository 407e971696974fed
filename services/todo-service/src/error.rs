use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use storeguard_datastore::{DatastoreError, ResilienceError};
use thiserror::Error;

pub const CIRCUIT_OPEN_MESSAGE: &str = "Service Unavailable (Circuit Breaker Open)";
const MASKED_MESSAGE: &str = "Internal Server Error";

/// How a request failed, as the client sees it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad input. Never reaches the datastore.
    #[error("{0}")]
    Validation(String),
    /// The breaker is refusing datastore calls.
    #[error("Service Unavailable (Circuit Breaker Open)")]
    Unavailable,
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Maps a guarded datastore failure. The datastore's own message is
    /// only passed on when `expose` is set.
    pub fn from_datastore(error: ResilienceError<DatastoreError>, expose: bool) -> Self {
        if error.is_fail_fast() {
            return ApiError::Unavailable;
        }
        tracing::error!(error = %error, "datastore operation failed");
        if expose {
            ApiError::Internal(error.to_string())
        } else {
            ApiError::Internal(MASKED_MESSAGE.to_string())
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
