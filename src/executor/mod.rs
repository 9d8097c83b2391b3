//! External downloader integration
//!
//! Two seams separate the job queue from the tool that does the actual work:
//!
//! - [`DownloadExecutor`] runs one download into the staging directory
//! - [`Prober`] expands a requested URL into the job specs to enqueue
//!
//! [`CliExecutor`] and [`CliProber`] drive the `yt-dlp` binary.
//! [`NoOpExecutor`] stands in when the binary is missing, so workers keep
//! recording failures instead of crashing.

mod cli;
mod noop;
mod parser;
mod traits;

pub use cli::{CliExecutor, CliProber, JOB_ID_PLACEHOLDER};
pub use noop::NoOpExecutor;
pub use parser::{ExitStatus, failure_diagnostic, parse_probe_output};
pub use traits::{DownloadExecutor, ExecutionOutcome, ExecutionRequest, Prober};

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
