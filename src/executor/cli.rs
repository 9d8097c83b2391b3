//! CLI-based downloader and prober using the external yt-dlp binary

use super::parser::{ExitStatus, failure_diagnostic, parse_probe_output};
use super::traits::{DownloadExecutor, ExecutionOutcome, ExecutionRequest, Prober};
use crate::config::{ReconcileConfig, ToolsConfig};
use crate::types::JobSpec;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Placeholder in the output template replaced by the job id
pub const JOB_ID_PLACEHOLDER: &str = "{job_id}";

/// Run `command` to completion, killing it if `timeout` elapses first
///
/// Returns `Ok(None)` on timeout.
async fn run_with_timeout(
    command: &mut Command,
    timeout: Option<Duration>,
) -> std::io::Result<Option<Output>> {
    command.kill_on_drop(true);
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, command.output()).await {
            Ok(output) => output.map(Some),
            Err(_) => Ok(None),
        },
        None => command.output().await.map(Some),
    }
}

/// Downloads by running the external downloader binary
///
/// The command line is `<binary> <base flags> <options…> -o <template> -- <url>`,
/// with the output template placed under `<staging root>/<savedir>` and
/// `{job_id}` in it replaced by the job id.
///
/// # Examples
///
/// ```no_run
/// use mediaq::config::Config;
/// use mediaq::executor::{CliExecutor, DownloadExecutor, ExecutionRequest};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let executor = CliExecutor::from_config(&config.tools, &config.reconcile)
///     .expect("yt-dlp not found in PATH");
///
/// let outcome = executor
///     .execute(&ExecutionRequest {
///         job_id: "0123abcd".into(),
///         url: "https://video.example/watch?v=1".into(),
///         options: vec![],
///         savedir: "music".into(),
///     })
///     .await?;
/// println!("success: {}", outcome.success);
/// # Ok(())
/// # }
/// ```
pub struct CliExecutor {
    binary_path: PathBuf,
    base_flags: Vec<String>,
    output_template: String,
    staging_root: PathBuf,
    timeout: Option<Duration>,
}

impl CliExecutor {
    /// Create an executor for an explicit binary path
    pub fn new(binary_path: PathBuf, tools: &ToolsConfig, staging_root: PathBuf) -> Self {
        Self {
            binary_path,
            base_flags: tools.base_flags.clone(),
            output_template: tools.output_template.clone(),
            staging_root,
            timeout: tools.timeout,
        }
    }

    /// Resolve the binary from configuration or PATH
    ///
    /// `None` when no downloader can be found.
    pub fn from_config(tools: &ToolsConfig, reconcile: &ReconcileConfig) -> Option<Self> {
        tools
            .resolve_downloader()
            .map(|path| Self::new(path, tools, reconcile.staging_root.clone()))
    }

    /// Path of the binary this executor runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Output template path for a request
    pub fn output_path(&self, request: &ExecutionRequest) -> PathBuf {
        self.staging_root.join(&request.savedir).join(
            self.output_template
                .replace(JOB_ID_PLACEHOLDER, request.job_id.as_str()),
        )
    }

    /// Arguments passed to the binary for a request
    pub fn arguments(&self, request: &ExecutionRequest) -> Vec<String> {
        let mut args = self.base_flags.clone();
        args.extend(request.options.iter().cloned());
        args.push("-o".to_string());
        args.push(self.output_path(request).to_string_lossy().into_owned());
        args.push("--".to_string());
        args.push(request.url.clone());
        args
    }
}

#[async_trait]
impl DownloadExecutor for CliExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> crate::Result<ExecutionOutcome> {
        if !crate::utils::is_safe_relative(&request.savedir) {
            return Err(crate::Error::Reconcile(
                crate::error::ReconcileError::UnsafeSaveDir {
                    savedir: request.savedir.clone(),
                },
            ));
        }

        let staging_dir = self.staging_root.join(&request.savedir);
        tokio::fs::create_dir_all(&staging_dir).await.map_err(|e| {
            crate::Error::ExternalTool(format!(
                "Failed to create staging directory {}: {}",
                staging_dir.display(),
                e
            ))
        })?;

        let args = self.arguments(request);
        tracing::info!(
            job_id = %request.job_id,
            binary = %self.binary_path.display(),
            args = ?args,
            "running downloader"
        );

        let output = run_with_timeout(
            Command::new(&self.binary_path).args(&args),
            self.timeout,
        )
        .await
        .map_err(|e| crate::Error::ExternalTool(format!("Failed to execute downloader: {}", e)))?;

        let Some(output) = output else {
            let limit = self.timeout.map(|t| t.as_secs()).unwrap_or_default();
            tracing::warn!(job_id = %request.job_id, timeout_secs = limit, "downloader timed out");
            return Ok(ExecutionOutcome::failed(format!(
                "downloader timed out after {}s",
                limit
            )));
        };

        match ExitStatus::from(output.status.success()) {
            ExitStatus::Success => {
                tracing::info!(job_id = %request.job_id, url = %request.url, "downloader succeeded");
                Ok(ExecutionOutcome::succeeded(
                    String::from_utf8_lossy(&output.stdout).into_owned(),
                ))
            }
            ExitStatus::Failure => {
                let diagnostic = failure_diagnostic(
                    &output.stdout,
                    &output.stderr,
                    &output.status.to_string(),
                );
                tracing::error!(
                    job_id = %request.job_id,
                    status = %output.status,
                    error = %diagnostic,
                    "downloader failed"
                );
                Ok(ExecutionOutcome::failed(diagnostic))
            }
        }
    }

    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }
}

/// Probes URLs with `<binary> -j --no-progress --flat-playlist <options…> -- <url>`
pub struct CliProber {
    binary_path: PathBuf,
    timeout: Option<Duration>,
}

impl CliProber {
    /// Create a prober for an explicit binary path
    pub fn new(binary_path: PathBuf, timeout: Option<Duration>) -> Self {
        Self {
            binary_path,
            timeout,
        }
    }

    /// Resolve the binary from configuration or PATH
    pub fn from_config(tools: &ToolsConfig) -> Option<Self> {
        tools
            .resolve_downloader()
            .map(|path| Self::new(path, tools.timeout))
    }
}

#[async_trait]
impl Prober for CliProber {
    async fn probe(
        &self,
        url: &str,
        options: &[String],
        savedir: Option<&str>,
    ) -> crate::Result<Vec<JobSpec>> {
        let mut command = Command::new(&self.binary_path);
        command
            .args(["-j", "--no-progress", "--flat-playlist"])
            .args(options)
            .arg("--")
            .arg(url);

        let output = run_with_timeout(&mut command, self.timeout)
            .await
            .map_err(|e| crate::Error::Probe(format!("Failed to execute downloader: {}", e)))?
            .ok_or_else(|| crate::Error::Probe("probe timed out".to_string()))?;

        if !ExitStatus::from(output.status.success()).is_success() {
            return Err(crate::Error::Probe(format!(
                "probe failed ({}): {}",
                output.status,
                failure_diagnostic(&output.stdout, &output.stderr, "no output")
            )));
        }

        let specs = parse_probe_output(&output.stdout, url, options, savedir)?;
        tracing::info!(url, jobs = specs.len(), "probe finished");
        Ok(specs)
    }

    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }
}
