use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or rejected API key
    #[error("{0}")]
    Authentication(String),

    /// Request payload failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Out-of-range request parameters
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Bulk write reported per-item failures; earlier writes are kept
    #[error("Failed to index {failed} of {total} logs: {sample:?}...")]
    PartialWrite {
        failed: usize,
        total: usize,
        sample: Vec<String>,
    },

    /// Search execution failed; details are logged, not returned
    #[error("Search failed")]
    SearchFailed(String),

    /// Datastore transport or decoding errors; details are logged, not returned
    #[error("Datastore unavailable")]
    Datastore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PartialWrite { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::SearchFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Datastore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Authentication(_) => "AUTHENTICATION_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::PartialWrite { .. } => "PARTIAL_WRITE_FAILURE",
            AppError::SearchFailed(_) => "SEARCH_FAILED",
            AppError::Datastore(_) => "DATASTORE_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        match &self {
            AppError::SearchFailed(detail) => tracing::error!(
                error_code = error_code,
                status_code = status.as_u16(),
                detail = %detail,
                "Search request failed"
            ),
            AppError::Datastore(detail) => tracing::error!(
                error_code = error_code,
                status_code = status.as_u16(),
                detail = %detail,
                "Datastore request failed"
            ),
            AppError::Authentication(_) => tracing::warn!(
                error_code = error_code,
                status_code = status.as_u16(),
                message = %message,
                "Request rejected"
            ),
            _ => tracing::error!(
                error_code = error_code,
                status_code = status.as_u16(),
                message = %message,
                "Request error"
            ),
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
