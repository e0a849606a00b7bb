//! API error types and handling.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// API error type.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Exchange error: {0}")]
    Exchange(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Exchange(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Exchange(_) => "EXCHANGE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Database(_) => "DATABASE_ERROR",
        }
    }
}

impl From<tradepilot_core::Error> for ApiError {
    fn from(e: tradepilot_core::Error) -> Self {
        use tradepilot_core::Error as CoreError;
        match e {
            CoreError::Validation(message) => ApiError::Validation(message),
            CoreError::NotFound(message) => ApiError::NotFound(message),
            CoreError::DecisionNotActionable(message) => ApiError::Conflict(message),
            CoreError::MissingCredentials(message) => ApiError::BadRequest(message),
            CoreError::Exchange { message, .. } => ApiError::Exchange(message),
            CoreError::Database(e) => ApiError::Database(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(
                error_code = self.error_code(),
                error = %self,
                "Internal server error"
            );
        }

        let body = ErrorResponse::new(self.error_code(), self.to_string());
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tradepilot_core::Error as CoreError;

    #[test]
    fn terminal_decision_maps_to_conflict() {
        let err: ApiError =
            CoreError::DecisionNotActionable("already approved".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), "CONFLICT");
    }

    #[test]
    fn validation_maps_to_unprocessable() {
        let err: ApiError = CoreError::Validation("too small".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn exchange_maps_to_bad_gateway() {
        let err: ApiError = CoreError::Exchange {
            message: "rejected".to_string(),
            status: Some(400),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn missing_credentials_map_to_bad_request() {
        let err: ApiError = CoreError::MissingCredentials("no testnet pair".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
