//! Worker Loop
//!
//! One activation does at most one unit of work and returns. A supervisor
//! (systemd, a container restart policy, a shell loop) is expected to run
//! `mediaq work` again; state lives only in the store.
//!
//! ```text
//! failed (retryable) ──claim──┐
//!                             ├─> in_progress ──execute──> reconcile ──> completed
//! queue ──pop──> pending ─────┘        │                        │
//!                                      └──── failure ───────────┴──────> failed
//! ```

use crate::config::Config;
use crate::db::{Database, unix_now};
use crate::executor::{DownloadExecutor, ExecutionRequest};
use crate::jobs::{RetryScanner, StatusMigrator};
use crate::reconcile::FileReconciler;
use crate::types::{
    Fields, JobId, JobKey, JobRecord, JobSpec, JobStatus, WorkOutcome, fields, pending_fields,
};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Runs single activations of the job state machine
pub struct Worker {
    db: Database,
    namespace: String,
    queue_key: String,
    pop_timeout: Duration,
    pop_poll_interval: Duration,
    migrator: StatusMigrator,
    scanner: RetryScanner,
    executor: Arc<dyn DownloadExecutor>,
    reconciler: FileReconciler,
}

/// A job claimed by this activation, already in `in_progress`
struct ClaimedJob {
    key: JobKey,
    spec: JobSpec,
}

enum QueueClaim {
    Claimed(ClaimedJob),
    Empty,
    Dropped,
}

impl Worker {
    /// Create a worker over an open store
    pub fn new(db: Database, config: &Config, executor: Arc<dyn DownloadExecutor>) -> Self {
        Self {
            namespace: config.store.namespace.clone(),
            queue_key: config.store.queue_key.clone(),
            pop_timeout: config.worker.pop_timeout,
            pop_poll_interval: config.worker.pop_poll_interval,
            migrator: StatusMigrator::new(db.clone(), config.store.job_ttl),
            scanner: RetryScanner::new(
                db.clone(),
                config.store.namespace.clone(),
                config.worker.max_retries,
                config.store.job_ttl,
            ),
            executor,
            reconciler: FileReconciler::new(config.reconcile.clone()),
            db,
        }
    }

    /// Perform at most one unit of work
    ///
    /// Retryable failed jobs are preferred over fresh queue entries. Store
    /// errors are returned as-is; the caller exits and is restarted rather
    /// than retrying in-process.
    pub async fn run_once(&self) -> Result<WorkOutcome> {
        let claimed = match self.claim_retry().await? {
            Some(job) => job,
            None => match self.claim_from_queue().await? {
                QueueClaim::Claimed(job) => job,
                QueueClaim::Empty => return Ok(WorkOutcome::NoWork),
                QueueClaim::Dropped => return Ok(WorkOutcome::Discarded),
            },
        };

        self.process(claimed).await
    }

    /// Claim one retryable failed job, if any, straight into `in_progress`
    async fn claim_retry(&self) -> Result<Option<ClaimedJob>> {
        let Some(failed_key) = self.scanner.find_retryable().await? else {
            return Ok(None);
        };

        let Some(key) = self
            .migrator
            .claim(&failed_key, JobStatus::InProgress, &started_fields())
            .await?
        else {
            tracing::debug!(key = %failed_key, "retry claimed by another worker");
            return Ok(None);
        };

        let record = JobRecord::from_fields(&key, &self.migrator.read(&key).await?);
        tracing::info!(
            job_id = %key.job_id,
            failed_count = record.failed_count,
            url = %record.url,
            "retrying failed job"
        );

        Ok(Some(ClaimedJob {
            spec: record.to_spec(),
            key,
        }))
    }

    /// Pop the next queue entry and move it through `pending` into `in_progress`
    ///
    /// A malformed entry is dropped, never re-queued, as is an entry for a job
    /// that is already pending or running.
    async fn claim_from_queue(&self) -> Result<QueueClaim> {
        let Some(payload) = self
            .db
            .blocking_pop(&self.queue_key, self.pop_timeout, self.pop_poll_interval)
            .await?
        else {
            tracing::info!(
                timeout_secs = self.pop_timeout.as_secs(),
                "no work before pop timeout"
            );
            return Ok(QueueClaim::Empty);
        };

        let spec = match parse_payload(&payload) {
            Ok(spec) => spec,
            Err(reason) => {
                tracing::error!(
                    error = %reason,
                    payload = %payload,
                    "discarding malformed queue entry"
                );
                return Ok(QueueClaim::Dropped);
            }
        };

        let job_id = spec
            .id
            .clone()
            .map(JobId::from)
            .unwrap_or_else(JobId::generate);

        let Some(pending) = self.admit(job_id, &spec).await? else {
            return Ok(QueueClaim::Dropped);
        };
        let key = self
            .migrator
            .migrate(&pending, JobStatus::InProgress, &started_fields())
            .await?;

        tracing::info!(job_id = %key.job_id, url = %spec.url, "claimed job from queue");
        Ok(QueueClaim::Claimed(ClaimedJob { key, spec }))
    }

    /// Create the `pending` record for a queue entry
    ///
    /// A job id that already has a finished record (`completed` or `failed`)
    /// takes that record over, so one id never has two records. An entry for a
    /// job that is still pending or running elsewhere is dropped.
    async fn admit(&self, job_id: JobId, spec: &JobSpec) -> Result<Option<JobKey>> {
        let fresh = pending_fields(spec, unix_now());

        match self.migrator.locate(&self.namespace, &job_id).await? {
            None => {
                let pending = JobKey::new(self.namespace.clone(), JobStatus::Pending, job_id);
                self.migrator
                    .migrate(&pending, JobStatus::Pending, &fresh)
                    .await
                    .map(Some)
            }
            Some(existing) if existing.status.is_terminal() => {
                tracing::info!(
                    job_id = %existing.job_id,
                    previous = %existing.status,
                    "queue entry reruns an existing job"
                );
                // Results of the earlier run don't carry over
                let mut fresh = fresh;
                for stale in [
                    fields::COMPLETED_AT,
                    fields::FAILED_AT,
                    fields::OUTPUT,
                    fields::ERROR,
                ] {
                    fresh.insert(stale.to_string(), String::new());
                }
                let claimed = self
                    .migrator
                    .claim(&existing, JobStatus::Pending, &fresh)
                    .await?;
                if claimed.is_none() {
                    tracing::warn!(
                        key = %existing,
                        "existing record was claimed by another worker, dropping entry"
                    );
                }
                Ok(claimed)
            }
            Some(existing) => {
                tracing::warn!(
                    key = %existing,
                    url = %spec.url,
                    "job is already active, dropping duplicate queue entry"
                );
                Ok(None)
            }
        }
    }

    async fn process(&self, job: ClaimedJob) -> Result<WorkOutcome> {
        let ClaimedJob { key, spec } = job;
        let savedir = spec.savedir.clone().unwrap_or_default();
        let request = ExecutionRequest {
            job_id: key.job_id.clone(),
            url: spec.url.clone(),
            options: spec.options.clone(),
            savedir: savedir.clone(),
        };

        let outcome = match self.executor.execute(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    job_id = %key.job_id,
                    executor = self.executor.name(),
                    error = %e,
                    "downloader could not run"
                );
                return self.fail(&key, &e.to_string()).await;
            }
        };

        if !outcome.success {
            return self.fail(&key, &outcome.output).await;
        }

        let display_name = spec.filename.as_deref();
        match self
            .reconciler
            .reconcile(&key.job_id, &savedir, display_name)
            .await
        {
            Ok(true) => self.complete(&key, &outcome.output).await,
            Ok(false) => {
                self.fail(&key, "downloaded file was not delivered before the copy timeout")
                    .await
            }
            Err(e) => self.fail(&key, &e.to_string()).await,
        }
    }

    async fn complete(&self, key: &JobKey, output: &str) -> Result<WorkOutcome> {
        let mut extra = Fields::new();
        extra.insert(fields::COMPLETED_AT.to_string(), unix_now().to_string());
        extra.insert(fields::OUTPUT.to_string(), output.to_string());

        let completed = self
            .migrator
            .migrate(key, JobStatus::Completed, &extra)
            .await?;
        tracing::info!(job_id = %completed.job_id, "job completed");
        Ok(WorkOutcome::Completed(completed.job_id))
    }

    async fn fail(&self, key: &JobKey, error: &str) -> Result<WorkOutcome> {
        let failures = self.migrator.increment_failed_count(key, 1).await?;

        let mut extra = Fields::new();
        extra.insert(fields::ERROR.to_string(), error.to_string());
        extra.insert(fields::FAILED_AT.to_string(), unix_now().to_string());

        let failed = self.migrator.migrate(key, JobStatus::Failed, &extra).await?;
        tracing::warn!(
            job_id = %failed.job_id,
            failed_count = failures,
            error = %error,
            "job failed"
        );
        Ok(WorkOutcome::Failed(failed.job_id))
    }
}

fn started_fields() -> Fields {
    let mut extra = Fields::new();
    extra.insert(fields::STARTED_AT.to_string(), unix_now().to_string());
    extra
}

/// Decode a queue entry; an entry without a usable URL is malformed
fn parse_payload(payload: &str) -> std::result::Result<JobSpec, String> {
    let spec: JobSpec = serde_json::from_str(payload).map_err(|e| e.to_string())?;
    if spec.url.trim().is_empty() {
        return Err("job has an empty url".to_string());
    }
    Ok(spec)
}
