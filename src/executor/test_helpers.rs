//! Scripted stand-ins for the downloader and prober used across test modules.

use super::{DownloadExecutor, ExecutionOutcome, ExecutionRequest, Prober};
use crate::types::JobSpec;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

/// What the next scripted run does
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// Exit successfully after writing `<title> [<job_id>].mp4` into staging
    Produce(&'static str),
    /// Exit successfully without producing a file
    Vanish,
    /// Exit with a failure diagnostic
    Fail(&'static str),
    /// Fail to start at all
    Crash(&'static str),
}

/// Downloader that follows a script instead of running a binary
///
/// Once the script runs out, every call produces a file titled "clip".
pub(crate) struct ScriptedExecutor {
    staging_root: PathBuf,
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<ExecutionRequest>>,
}

impl ScriptedExecutor {
    pub(crate) fn new(staging_root: impl Into<PathBuf>, steps: Vec<Step>) -> Self {
        Self {
            staging_root: staging_root.into(),
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far, in order
    pub(crate) fn calls(&self) -> Vec<ExecutionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DownloadExecutor for ScriptedExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionOutcome> {
        self.calls.lock().unwrap().push(request.clone());
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Produce("clip"));

        match step {
            Step::Produce(title) => {
                let dir = self.staging_root.join(&request.savedir);
                tokio::fs::create_dir_all(&dir).await?;
                let name = format!("{} [{}].mp4", title, request.job_id);
                tokio::fs::write(dir.join(&name), title.as_bytes()).await?;
                Ok(ExecutionOutcome::succeeded(format!(
                    "[download] Destination: {name}"
                )))
            }
            Step::Vanish => Ok(ExecutionOutcome::succeeded("")),
            Step::Fail(diagnostic) => Ok(ExecutionOutcome::failed(diagnostic)),
            Step::Crash(reason) => Err(Error::ExternalTool(reason.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Prober returning a fixed expansion, or failing every call
pub(crate) struct ScriptedProber {
    specs: Option<Vec<JobSpec>>,
    calls: Mutex<Vec<(String, Vec<String>, Option<String>)>>,
}

impl ScriptedProber {
    /// Every probe yields `specs`, with the caller's options and savedir applied
    pub(crate) fn returning(specs: Vec<JobSpec>) -> Self {
        Self {
            specs: Some(specs),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every probe fails
    pub(crate) fn failing() -> Self {
        Self {
            specs: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Arguments of every probe so far
    pub(crate) fn calls(&self) -> Vec<(String, Vec<String>, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(
        &self,
        url: &str,
        options: &[String],
        savedir: Option<&str>,
    ) -> Result<Vec<JobSpec>> {
        self.calls.lock().unwrap().push((
            url.to_string(),
            options.to_vec(),
            savedir.map(str::to_string),
        ));

        let Some(specs) = &self.specs else {
            return Err(Error::Probe("ERROR: Unsupported URL".to_string()));
        };
        Ok(specs
            .iter()
            .cloned()
            .map(|spec| JobSpec {
                options: options.to_vec(),
                savedir: savedir.map(str::to_string),
                ..spec
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
