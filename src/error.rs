//! Error types for mediaq
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Database, Reconcile, Probe, etc.)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for mediaq operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mediaq
///
/// Each variant carries enough context to diagnose the failure from a log line.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "store.namespace")
        key: Option<String>,
    },

    /// Job store operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Request rejected during validation
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Probing a URL into job specs failed
    #[error("probe failed: {0}")]
    Probe(String),

    /// External tool execution failed (spawn failure, timeout)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Delivering the produced file failed
    #[error("reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Record not found
    #[error("not found: {0}")]
    NotFound(String),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Job store errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to open or connect to the store
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// A stored value could not be decoded
    #[error("corrupt record {key}: {reason}")]
    CorruptRecord {
        /// Key of the offending record
        key: String,
        /// What was wrong with it
        reason: String,
    },
}

/// File delivery errors raised while relocating a staged file
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The savedir would escape the staging or final root
    #[error("unsafe save directory {savedir:?}")]
    UnsafeSaveDir {
        /// The rejected save directory
        savedir: String,
    },

    /// Copying the staged file failed
    #[error("failed to copy {source_path} to {dest_path}: {reason}")]
    CopyFailed {
        /// The staged file
        source_path: PathBuf,
        /// The intended destination
        dest_path: PathBuf,
        /// Why it failed
        reason: String,
    },

    /// The copy finished but the destination does not match the source
    #[error("copy of {dest_path} is incomplete: expected {expected} bytes, found {actual}")]
    SizeMismatch {
        /// The destination that failed verification
        dest_path: PathBuf,
        /// Size of the staged file
        expected: u64,
        /// Size found at the destination
        actual: u64,
    },
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "invalid_request",
///     "message": "Invalid request."
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "invalid_request", "internal_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    /// Create an "invalid request" error
    pub fn invalid_request() -> Self {
        Self::new("invalid_request", "Invalid request.")
    }

    /// Create an "internal server error"
    pub fn internal() -> Self {
        Self::new("internal_error", "Internal server error.")
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - the caller sent something unusable
            Error::Config { .. } => 400,
            Error::InvalidRequest(_) => 400,
            // A probe failure means the tool is broken, reported as a client-facing 400
            Error::Probe(_) => 400,

            Error::NotFound(_) => 404,

            Error::Reconcile(_) => 422,

            Error::ExternalTool(_) => 503,

            Error::Database(_)
            | Error::Sqlx(_)
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::ApiServerError(_)
            | Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Probe(_) => "probe_failed",
            Error::ExternalTool(_) => "external_tool_error",
            Error::Reconcile(e) => match e {
                ReconcileError::UnsafeSaveDir { .. } => "unsafe_savedir",
                ReconcileError::CopyFailed { .. } => "copy_failed",
                ReconcileError::SizeMismatch { .. } => "size_mismatch",
            },
            Error::NotFound(_) => "not_found",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();

        // Server-side failures never leak their internals to the caller
        let message = match error.status_code() {
            500..=599 => "Internal server error.".to_string(),
            _ => match &error {
                Error::InvalidRequest(_) | Error::Config { .. } => "Invalid request.".to_string(),
                Error::Probe(_) => "Probe failed; waiting for restart.".to_string(),
                other => other.to_string(),
            },
        };

        ApiError {
            error: ErrorDetail { code, message },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn all_error_variants() -> Vec<(Error, u16, &'static str)> {
        vec![
            (
                Error::Config {
                    message: "bad value".into(),
                    key: Some("store.namespace".into()),
                },
                400,
                "config_error",
            ),
            (
                Error::InvalidRequest("url missing".into()),
                400,
                "invalid_request",
            ),
            (Error::Probe("rc=1".into()), 400, "probe_failed"),
            (Error::NotFound("job abc".into()), 404, "not_found"),
            (
                Error::Database(DatabaseError::QueryFailed("locked".into())),
                500,
                "database_error",
            ),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                500,
                "io_error",
            ),
            (
                Error::ApiServerError("bind failed".into()),
                500,
                "api_server_error",
            ),
            (Error::Other("unknown".into()), 500, "internal_error"),
            (
                Error::ExternalTool("yt-dlp not found".into()),
                503,
                "external_tool_error",
            ),
            (
                Error::Reconcile(ReconcileError::UnsafeSaveDir {
                    savedir: "../etc".into(),
                }),
                422,
                "unsafe_savedir",
            ),
            (
                Error::Reconcile(ReconcileError::CopyFailed {
                    source_path: PathBuf::from("/tmp/a.mp4"),
                    dest_path: PathBuf::from("/dl/a.mp4"),
                    reason: "disk full".into(),
                }),
                422,
                "copy_failed",
            ),
            (
                Error::Reconcile(ReconcileError::SizeMismatch {
                    dest_path: PathBuf::from("/dl/a.mp4"),
                    expected: 10,
                    actual: 3,
                }),
                422,
                "size_mismatch",
            ),
        ]
    }

    #[test]
    fn every_variant_maps_to_expected_status_and_code() {
        for (error, status, code) in all_error_variants() {
            assert_eq!(error.status_code(), status, "status for {error:?}");
            assert_eq!(error.error_code(), code, "code for {error:?}");
        }
    }

    #[test]
    fn server_errors_never_leak_internal_detail() {
        let error = Error::Database(DatabaseError::QueryFailed(
            "no such table: job_records".into(),
        ));
        let api_error: ApiError = error.into();

        assert_eq!(api_error.error.code, "database_error");
        assert_eq!(api_error.error.message, "Internal server error.");
    }

    #[test]
    fn invalid_request_uses_generic_message() {
        let api_error: ApiError = Error::InvalidRequest("options must be a string".into()).into();
        assert_eq!(api_error.error.message, "Invalid request.");
    }

    #[test]
    fn api_error_serializes_under_error_key() {
        let json = serde_json::to_value(ApiError::invalid_request()).unwrap();
        assert_eq!(json["error"]["code"], "invalid_request");
        assert!(json["error"].get("details").is_none());
    }
}
