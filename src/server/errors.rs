use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Local;
use procurement_flow::CriteriaError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing X-API-Key header")]
    MissingApiKey,
    #[error("invalid API key")]
    InvalidApiKey,
    #[error(transparent)]
    InvalidCriteria(#[from] CriteriaError),
    #[error("another extraction is already running")]
    Busy,
    #[error("extraction did not finish within {secs}s")]
    Timeout { secs: u64 },
    #[error("{0}")]
    RunFailed(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: &'static str,
    pub error: String,
    pub timestamp: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingApiKey => StatusCode::UNAUTHORIZED,
            ApiError::InvalidApiKey => StatusCode::FORBIDDEN,
            ApiError::InvalidCriteria(_) => StatusCode::BAD_REQUEST,
            ApiError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Timeout { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::RunFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingApiKey => "unauthorized",
            ApiError::InvalidApiKey => "forbidden",
            ApiError::InvalidCriteria(_) => "invalid_argument",
            ApiError::Busy => "busy",
            ApiError::Timeout { .. } => "timeout",
            ApiError::RunFailed(_) => "run_failed",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            success: false,
            code: self.code(),
            error: self.to_string(),
            timestamp: Local::now().to_rfc3339(),
        };
        (status, axum::Json(body)).into_response()
    }
}
