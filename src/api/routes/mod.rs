//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`downloads`] - Immediate submission, scheduled processing, retry reset
//! - [`schedule`] - Deferred request list
//! - [`jobs`] - Job records by status
//! - [`system`] - Health, OpenAPI

use crate::types::RequestRecord;
use crate::utils::{is_safe_relative, sanitize_savedir};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

mod downloads;
mod jobs;
mod schedule;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use downloads::*;
pub use jobs::*;
pub use schedule::*;
pub use system::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Request body for POST /download and POST /schedule
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct DownloadRequest {
    /// URL to download; must be a non-empty string
    #[serde(default)]
    pub url: Option<String>,
    /// Downloader options as one whitespace-separated string
    #[serde(default)]
    #[schema(example = "-f bestaudio -x")]
    pub options: Option<String>,
    /// Save directory below the staging and final roots
    #[serde(default)]
    pub savedir: Option<String>,
}

impl DownloadRequest {
    /// Validate and normalize into a stored request
    ///
    /// Options are split on whitespace; the save directory is sanitized into a
    /// single safe path segment.
    pub fn into_record(self) -> Result<RequestRecord> {
        let url = self
            .url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| Error::InvalidRequest("url must be a non-empty string".to_string()))?;

        let options = self
            .options
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let savedir = match self.savedir.map(|raw| sanitize_savedir(&raw)) {
            Some(dir) if !is_safe_relative(&dir) => {
                return Err(Error::InvalidRequest(format!("unsafe savedir {dir:?}")));
            }
            other => other,
        };

        Ok(RequestRecord {
            url,
            options,
            savedir,
        })
    }
}

/// Request body for POST /download/scheduled
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ProcessScheduledRequest {
    /// How many stored requests to process: a number, or "all" (default)
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "all")]
    pub count: Option<serde_json::Value>,
}

impl ProcessScheduledRequest {
    /// Resolve the limit; `None` means every stored request
    ///
    /// Numbers below one are raised to one. Numeric strings are accepted.
    pub fn limit(&self) -> Result<Option<u64>> {
        let invalid = || Error::InvalidRequest("Invalid count parameter.".to_string());

        let requested = match &self.count {
            None | Some(serde_json::Value::Null) => return Ok(None),
            Some(serde_json::Value::String(s)) if s == "all" => return Ok(None),
            Some(serde_json::Value::String(s)) => s.trim().parse::<i64>().map_err(|_| invalid())?,
            Some(serde_json::Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .ok_or_else(invalid)?,
            Some(_) => return Err(invalid()),
        };

        Ok(Some(requested.max(1) as u64))
    }
}

/// Plain acknowledgement
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    /// Human-readable result
    pub message: String,
}

impl MessageResponse {
    /// Acknowledge with `message`
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Acknowledgement carrying how many items were affected
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CountResponse {
    /// Human-readable result
    pub message: String,
    /// Number of requests processed or records reset
    pub count: u64,
}
