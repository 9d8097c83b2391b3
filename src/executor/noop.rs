//! No-op executor for graceful degradation

use super::traits::{DownloadExecutor, ExecutionOutcome, ExecutionRequest};
use async_trait::async_trait;

/// Executor used when no downloader binary is available
///
/// Every run fails with a diagnostic, so jobs are recorded as failed (and
/// retried later) instead of the worker refusing to start.
///
/// # Examples
///
/// ```
/// use mediaq::executor::{DownloadExecutor, ExecutionRequest, NoOpExecutor};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let outcome = NoOpExecutor
///     .execute(&ExecutionRequest {
///         job_id: "abc".into(),
///         url: "https://video.example/1".into(),
///         options: vec![],
///         savedir: String::new(),
///     })
///     .await?;
/// assert!(!outcome.success);
/// # Ok(())
/// # }
/// ```
pub struct NoOpExecutor;

#[async_trait]
impl DownloadExecutor for NoOpExecutor {
    async fn execute(&self, _request: &ExecutionRequest) -> crate::Result<ExecutionOutcome> {
        Ok(ExecutionOutcome::failed(
            "downloader not available. \
             Configure tools.downloader_path or ensure yt-dlp is in PATH.",
        ))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
