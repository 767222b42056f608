use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use lossless_audio::{RangeError, StorageError};
use serde_json::json;
use thiserror::Error;

/// Every handler failure, mapped onto a status code and a `{"error": ...}` body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    /// The song record exists but its audio file is gone from storage
    #[error("Audio file not found")]
    AudioFileMissing,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    UploadRejected(String),

    #[error("File too large (limit {limit} bytes)")]
    PayloadTooLarge { limit: usize },

    #[error("{0}")]
    Conflict(String),

    #[error("Requested range not satisfiable")]
    RangeNotSatisfiable { size: u64 },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) | ApiError::AudioFileMissing => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) | ApiError::UploadRejected(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::Internal(_) | ApiError::Db(_) | ApiError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{what} not found"))
    }
}

impl From<RangeError> for ApiError {
    fn from(err: RangeError) -> Self {
        match err {
            RangeError::NotSatisfiable { size } => ApiError::RangeNotSatisfiable { size },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Server-side details stay in the logs
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({ "error": message }));

        match self {
            ApiError::RangeNotSatisfiable { size } => (
                status,
                [(header::CONTENT_RANGE, format!("bytes */{size}"))],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::not_found("Song").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::AudioFileMissing.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::UploadRejected("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::PayloadTooLarge { limit: 1 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::RangeNotSatisfiable { size: 10 }.status(),
            StatusCode::RANGE_NOT_SATISFIABLE
        );
        assert_eq!(
            ApiError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(ApiError::not_found("Song").to_string(), "Song not found");
    }

    #[test]
    fn test_range_error_conversion() {
        let err: ApiError = RangeError::NotSatisfiable { size: 42 }.into();
        assert!(matches!(err, ApiError::RangeNotSatisfiable { size: 42 }));
    }

    #[test]
    fn test_range_not_satisfiable_sets_content_range() {
        let resp = ApiError::RangeNotSatisfiable { size: 1000 }.into_response();
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes */1000");
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let resp = ApiError::Internal("secret detail".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
