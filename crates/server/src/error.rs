//! Structured errors for the REST API.
//!
//! Every failure is returned as
//! `{"error": {"code", "message", "correlation_id"}}` with the status code
//! that belongs to its machine code.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use copyr_client::AnalyzeError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    Database(String),

    #[error("{0}")]
    ExternalService(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Authentication(_) => "AUTHENTICATION_ERROR",
            ApiError::Authorization(_) => "AUTHORIZATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::RateLimited(_) => "RATE_LIMIT_EXCEEDED",
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ExternalService(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<copyr_core::Error> for ApiError {
    fn from(err: copyr_core::Error) -> Self {
        use copyr_core::Error;
        match err {
            Error::InvalidInput(msg) => ApiError::Validation(msg),
            Error::UnsupportedCountry { country, supported } => {
                ApiError::Validation(format!("Country '{country}' is not supported. Supported countries: {supported}"))
            }
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::Database(_) | Error::MigrationFailed(_) | Error::Serialization(_) => {
                ApiError::Database(err.to_string())
            }
        }
    }
}

impl From<AnalyzeError> for ApiError {
    fn from(err: AnalyzeError) -> Self {
        match err {
            AnalyzeError::Core(e) => e.into(),
            AnalyzeError::Source(e) => ApiError::ExternalService(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), %correlation_id, error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), %correlation_id, error = %self, "request rejected");
        }

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "correlation_id": correlation_id,
            }
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
