//! Traits and types for running the external downloader

use crate::types::{JobId, JobSpec};
use async_trait::async_trait;

/// One download to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Job id, embedded in the output file name so the result can be found
    pub job_id: JobId,
    /// URL to download
    pub url: String,
    /// Caller-supplied downloader options, passed through in order
    pub options: Vec<String>,
    /// Save directory relative to the staging root
    pub savedir: String,
}

/// Result of a finished downloader run
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Whether the downloader exited successfully
    pub success: bool,
    /// Captured stdout on success, diagnostic text on failure
    pub output: String,
}

impl ExecutionOutcome {
    /// A successful run with its captured output
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    /// A failed run with its diagnostic text
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            output: diagnostic.into(),
        }
    }
}

/// Runs the download for one job
///
/// A non-zero exit is a normal [`ExecutionOutcome`] with `success == false`.
/// `Err` is reserved for runs that could not happen at all (the binary is
/// missing, spawning failed); the worker records both as a failed attempt.
#[async_trait]
pub trait DownloadExecutor: Send + Sync {
    /// Run the downloader to completion
    async fn execute(&self, request: &ExecutionRequest) -> crate::Result<ExecutionOutcome>;

    /// Name of this implementation, for logging
    fn name(&self) -> &'static str;
}

/// Expands one requested URL into the jobs to enqueue
///
/// A playlist yields one spec per entry; a single video yields one spec.
/// Implementations never assign job ids. Failure of any kind is
/// [`Error::Probe`](crate::Error::Probe).
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe `url` with the caller's options
    async fn probe(
        &self,
        url: &str,
        options: &[String],
        savedir: Option<&str>,
    ) -> crate::Result<Vec<JobSpec>>;

    /// Name of this implementation, for logging
    fn name(&self) -> &'static str;
}
