//! Enqueuer: writes job specs to the submission queue and requests to the schedule list.

use crate::db::Database;
use crate::types::{JobSpec, RequestRecord, ScheduledRequest};
use crate::Result;

/// Producer side of the submission queue
#[derive(Clone)]
pub struct Enqueuer {
    db: Database,
    queue_key: String,
    requests_key: String,
}

impl Enqueuer {
    /// Create an enqueuer for the given queue and schedule list
    pub fn new(
        db: Database,
        queue_key: impl Into<String>,
        requests_key: impl Into<String>,
    ) -> Self {
        Self {
            db,
            queue_key: queue_key.into(),
            requests_key: requests_key.into(),
        }
    }

    /// Append one job to the tail of the submission queue
    ///
    /// No job record is created here; the queue entry is the only trace of the
    /// job until a worker claims it.
    pub async fn enqueue(&self, spec: &JobSpec) -> Result<()> {
        let payload = serde_json::to_string(spec)?;
        let depth = self.db.list_push(&self.queue_key, &payload).await?;
        tracing::info!(url = %spec.url, queue_depth = depth, "job enqueued");
        Ok(())
    }

    /// Append every job in order; returns how many were enqueued
    pub async fn enqueue_all(&self, specs: &[JobSpec]) -> Result<usize> {
        for spec in specs {
            self.enqueue(spec).await?;
        }
        Ok(specs.len())
    }

    /// Number of jobs waiting in the submission queue
    pub async fn queue_len(&self) -> Result<u64> {
        self.db.list_len(&self.queue_key).await
    }

    /// Store a request for later processing
    pub async fn schedule(&self, request: &RequestRecord) -> Result<()> {
        let payload = serde_json::to_string(request)?;
        self.db.list_push(&self.requests_key, &payload).await?;
        tracing::info!(url = %request.url, "request scheduled");
        Ok(())
    }

    /// Stored requests, oldest first, without their options
    ///
    /// Entries that fail to parse are skipped.
    pub async fn scheduled(&self) -> Result<Vec<ScheduledRequest>> {
        let entries = self.db.list_range(&self.requests_key, None).await?;
        Ok(entries
            .iter()
            .filter_map(|raw| parse_request(raw))
            .map(ScheduledRequest::from)
            .collect())
    }

    /// Remove up to `count` stored requests from the head of the list
    ///
    /// `None` drains the whole list. Unparsable entries are dropped and do not
    /// count toward the limit.
    pub async fn pop_scheduled(&self, count: Option<u64>) -> Result<Vec<RequestRecord>> {
        let mut popped = Vec::new();

        while count.is_none_or(|limit| (popped.len() as u64) < limit) {
            let Some(raw) = self.db.list_pop(&self.requests_key).await? else {
                break;
            };
            if let Some(request) = parse_request(&raw) {
                popped.push(request);
            }
        }

        Ok(popped)
    }
}

fn parse_request(raw: &str) -> Option<RequestRecord> {
    match serde_json::from_str(raw) {
        Ok(request) => Some(request),
        Err(e) => {
            tracing::warn!(error = %e, "skipping unparsable scheduled request");
            None
        }
    }
}
