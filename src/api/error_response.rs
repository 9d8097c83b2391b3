//! HTTP error response handling for the API
//!
//! Converts domain errors to HTTP responses with appropriate status codes and
//! JSON error bodies.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Implement IntoResponse for Error to automatically convert errors to HTTP responses
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // The body carries a generic message for these; the detail goes to the log
        if status_code.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        } else {
            tracing::warn!(error = %self, code = self.error_code(), "request rejected");
        }

        let api_error: ApiError = self.into();
        (status_code, Json(api_error)).into_response()
    }
}

/// Implement IntoResponse for ApiError for explicit error responses
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Errors with a known status go through Error::into_response
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

/// Malformed or mistyped JSON bodies are invalid requests
impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidRequest(rejection.body_text())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatabaseError;

    async fn body_of(response: Response) -> ApiError {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_request_into_response() {
        let response = Error::InvalidRequest("url must be a string".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let api_error = body_of(response).await;
        assert_eq!(api_error.error.code, "invalid_request");
        assert_eq!(api_error.error.message, "Invalid request.");
    }

    #[tokio::test]
    async fn test_probe_error_into_response() {
        let response = Error::Probe("yt-dlp not found".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let api_error = body_of(response).await;
        assert_eq!(api_error.error.code, "probe_failed");
        assert!(!api_error.error.message.contains("yt-dlp not found"));
    }

    #[tokio::test]
    async fn test_database_error_hides_detail() {
        let response = Error::Database(DatabaseError::QueryFailed(
            "database is locked".to_string(),
        ))
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let api_error = body_of(response).await;
        assert_eq!(api_error.error.code, "database_error");
        assert_eq!(api_error.error.message, "Internal server error.");
    }

    #[tokio::test]
    async fn test_not_found_keeps_message() {
        let response = Error::NotFound("job status paused".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let api_error = body_of(response).await;
        assert!(api_error.error.message.contains("paused"));
    }
}
