use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Error taxonomy from spec §7. The Provider Adapter (C1) has its own typed
/// `ProviderError` (see `provider::ProviderError`) and never raises this
/// type directly; the Gateway converts a terminal provider failure into one
/// of these variants at the boundary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing or invalid API key")]
    AuthError,

    #[error("invalid request: {0}")]
    ClientError(String),

    #[error("rate limited")]
    RateLimited,

    #[error("no provider available: {0}")]
    ProviderUnavailable(String),

    #[error("blocked by provider content filter")]
    ContentFilter,

    #[error("fetch timed out")]
    FetchTimeout,

    #[error("fetch blocked: {0}")]
    FetchBlocked(String),

    #[error("response exceeded size cap")]
    TooLarge,

    #[error("failed to parse response: {0}")]
    ParseError(String),

    #[error("verdict did not validate against schema: {0}")]
    SchemaViolation(String),

    #[error("cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::AuthError => "auth_error",
            AppError::ClientError(_) => "client_error",
            AppError::RateLimited => "rate_limited",
            AppError::ProviderUnavailable(_) => "provider_unavailable",
            AppError::ContentFilter => "content_filter",
            AppError::FetchTimeout => "fetch_timeout",
            AppError::FetchBlocked(_) => "fetch_blocked",
            AppError::TooLarge => "too_large",
            AppError::ParseError(_) => "parse_error",
            AppError::SchemaViolation(_) => "schema_violation",
            AppError::Cancelled => "cancelled",
            AppError::Storage(_) => "internal",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AppError::AuthError => (StatusCode::UNAUTHORIZED, "authentication_error"),
            AppError::ClientError(_) => (StatusCode::BAD_REQUEST, "invalid_request_error"),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limit_error"),
            AppError::ProviderUnavailable(_) => (StatusCode::BAD_GATEWAY, "provider_error"),
            AppError::ContentFilter => (StatusCode::UNPROCESSABLE_ENTITY, "content_filter_error"),
            AppError::FetchTimeout => (StatusCode::GATEWAY_TIMEOUT, "timeout_error"),
            AppError::FetchBlocked(_) => (StatusCode::BAD_GATEWAY, "fetch_error"),
            AppError::TooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "invalid_request_error"),
            AppError::ParseError(_) => (StatusCode::BAD_GATEWAY, "parse_error"),
            AppError::SchemaViolation(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "schema_error")
            }
            AppError::Cancelled => (StatusCode::REQUEST_TIMEOUT, "cancelled_error"),
            AppError::Storage(e) => {
                tracing::error!("storage error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        let request_id = uuid::Uuid::new_v4().to_string();
        let body = Json(json!({
            "error": self.to_string(),
            "type": error_type,
            "code": self.code(),
            "request_id": request_id,
        }));

        let mut response = (status, body).into_response();
        if matches!(self, AppError::RateLimited) {
            response
                .headers_mut()
                .insert("retry-after", axum::http::HeaderValue::from_static("60"));
        }
        response
    }
}
