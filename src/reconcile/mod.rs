//! File Reconciler
//!
//! The downloader writes somewhere under `<staging_root>/<savedir>` with the
//! job id embedded in the file name, and it may still be flushing when it
//! exits. The reconciler polls for that file, gives it its final name, and
//! copies it to `<final_root>/<savedir>`. A job only counts as completed once
//! this returns `true`.
//!
//! ## Submodules
//!
//! - [`matching`] - which files belong to a job, picking among candidates
//! - [`placement`] - copy-verify-rename into the final directory

use crate::config::ReconcileConfig;
use crate::error::ReconcileError;
use crate::types::JobId;
use crate::utils::{deadline_after, destination_name, is_safe_relative};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::time::Instant;

pub mod matching;
pub mod placement;

use matching::{Candidate, MatchRules, non_empty_file, pick_candidate, scan_candidates};
use placement::{Placement, place_file};

/// Delivers a job's staged file to its final location
#[derive(Debug, Clone)]
pub struct FileReconciler {
    config: ReconcileConfig,
    rules: MatchRules,
}

impl FileReconciler {
    /// Create a reconciler from configuration
    pub fn new(config: ReconcileConfig) -> Self {
        let rules = MatchRules::new(&config.media_extensions, &config.partial_extensions);
        Self { config, rules }
    }

    /// Locate the file produced for `job_id` and place it in the final directory
    ///
    /// Polls the staging directory every `poll_interval` until `copy_timeout`
    /// elapses. Zero-byte files are treated as still being written: they never
    /// match, and they do not extend the deadline. Returns `Ok(true)` once a
    /// non-empty file is at the destination, including when an earlier run
    /// already put it there, and `Ok(false)` when the deadline passes first.
    /// An unsafe `savedir` is an error.
    pub async fn reconcile(
        &self,
        job_id: &JobId,
        savedir: &str,
        display_name: Option<&str>,
    ) -> Result<bool> {
        if !is_safe_relative(savedir) {
            return Err(Error::Reconcile(ReconcileError::UnsafeSaveDir {
                savedir: savedir.to_string(),
            }));
        }

        let staging_dir = self.config.staging_root.join(savedir);
        let final_dir = self.config.final_root.join(savedir);
        let deadline = deadline_after(self.config.copy_timeout);

        loop {
            match self.scan_staging(&staging_dir, job_id).await? {
                Some(staged) => match self.deliver(&staged, &final_dir, display_name).await {
                    Ok(placement) => {
                        self.remove_staged(job_id, &staged).await;
                        tracing::info!(
                            job_id = %job_id,
                            source = %staged.path.display(),
                            dest = %placement.path().display(),
                            copied = matches!(placement, Placement::Copied(_)),
                            "file delivered"
                        );
                        return Ok(true);
                    }
                    Err(e) => {
                        tracing::error!(
                            job_id = %job_id,
                            source = %staged.path.display(),
                            error = %e,
                            "failed to deliver staged file"
                        );
                    }
                },
                None => {
                    if let Some(existing) = self.find_placed(&final_dir, job_id, display_name) {
                        tracing::info!(
                            job_id = %job_id,
                            dest = %existing.display(),
                            "file already delivered"
                        );
                        return Ok(true);
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    job_id = %job_id,
                    staging_dir = %staging_dir.display(),
                    timeout_secs = self.config.copy_timeout.as_secs(),
                    "no deliverable file before timeout"
                );
                return Ok(false);
            }
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }

    /// Best non-empty candidate in the staging directory
    async fn scan_staging(
        &self,
        staging_dir: &Path,
        job_id: &JobId,
    ) -> Result<Option<Candidate>> {
        let dir = staging_dir.to_path_buf();
        let id = job_id.as_str().to_string();
        let rules = self.rules.clone();

        let candidates = tokio::task::spawn_blocking(move || scan_candidates(&dir, &id, &rules))
            .await
            .map_err(|e| Error::Other(format!("staging scan task panicked: {}", e)))?;

        Ok(pick_candidate(candidates))
    }

    async fn deliver(
        &self,
        staged: &Candidate,
        final_dir: &Path,
        display_name: Option<&str>,
    ) -> Result<Placement> {
        let name = destination_name(
            display_name,
            &staged.file_name,
            self.config.max_filename_bytes,
            &self.config.placeholder_name,
        );
        place_file(&staged.path, &final_dir.join(name)).await
    }

    async fn remove_staged(&self, job_id: &JobId, staged: &Candidate) {
        if !self.config.remove_staged {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(&staged.path).await {
            tracing::warn!(
                job_id = %job_id,
                path = %staged.path.display(),
                error = %e,
                "failed to remove staged file"
            );
        }
    }

    /// A non-empty file in `final_dir` that an earlier run delivered for this job
    ///
    /// Without a display name the delivered file kept its staged name, so it
    /// is found by job id. With one, every media extension is tried against
    /// the name the display name would produce.
    fn find_placed(
        &self,
        final_dir: &Path,
        job_id: &JobId,
        display_name: Option<&str>,
    ) -> Option<PathBuf> {
        match display_name.filter(|name| !name.trim().is_empty()) {
            Some(display) => self.rules.media_extensions().into_iter().find_map(|ext| {
                let path = final_dir.join(destination_name(
                    Some(display),
                    &format!("placeholder.{ext}"),
                    self.config.max_filename_bytes,
                    &self.config.placeholder_name,
                ));
                non_empty_file(&path).map(|_| path)
            }),
            None => std::fs::read_dir(final_dir)
                .ok()?
                .filter_map(|entry| entry.ok())
                .filter(|entry| {
                    entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| self.rules.matches(name, job_id.as_str()))
                })
                .map(|entry| entry.path())
                .find(|path| non_empty_file(path).is_some()),
        }
    }
}
