//! Retry Scanner: surfaces failed jobs that have attempts left.

use crate::db::Database;
use crate::types::{Fields, JobKey, JobStatus, fields, stored_failed_count};
use crate::Result;
use std::time::Duration;

/// Finds failed jobs whose failure count is below the retry limit
#[derive(Clone)]
pub struct RetryScanner {
    db: Database,
    namespace: String,
    max_retries: u32,
    ttl: Duration,
}

impl RetryScanner {
    /// Create a scanner over `namespace`
    pub fn new(
        db: Database,
        namespace: impl Into<String>,
        max_retries: u32,
        ttl: Duration,
    ) -> Self {
        Self {
            db,
            namespace: namespace.into(),
            max_retries,
            ttl,
        }
    }

    /// The first failed job, in key order, with `failed_count < max_retries`
    ///
    /// Records whose count is not an integer are skipped; a worker could not
    /// record another failure on them.
    ///
    /// Finding a key does not reserve it; claim it through
    /// [`StatusMigrator::claim`](super::StatusMigrator::claim).
    pub async fn find_retryable(&self) -> Result<Option<JobKey>> {
        let prefix = JobKey::status_prefix(&self.namespace, JobStatus::Failed);

        for (raw_key, record) in self.db.scan_prefix_with_fields(&prefix).await? {
            match stored_failed_count(&record) {
                Some(count) if count < i64::from(self.max_retries) => {}
                Some(_) => continue,
                None => {
                    tracing::warn!(
                        key = %raw_key,
                        failed_count = ?record.get(fields::FAILED_COUNT),
                        "skipping failed record with non-integer failure count"
                    );
                    continue;
                }
            }
            match JobKey::parse(&self.namespace, &raw_key) {
                Some(key) => return Ok(Some(key)),
                None => {
                    tracing::warn!(key = %raw_key, "ignoring failed record with malformed key")
                }
            }
        }

        Ok(None)
    }

    /// Zero the failure count of every failed job; returns how many were reset
    pub async fn reset_all_failed_counts(&self) -> Result<u64> {
        let prefix = JobKey::status_prefix(&self.namespace, JobStatus::Failed);
        let mut reset = Fields::new();
        reset.insert(fields::FAILED_COUNT.to_string(), "0".to_string());

        let mut count = 0;
        for key in self.db.scan_prefix(&prefix).await? {
            // Records claimed by a worker since the scan are left alone
            if self.db.claim_hash(&key, &key, &reset, self.ttl).await? {
                count += 1;
            }
        }

        tracing::info!(count, "reset failed counts");
        Ok(count)
    }
}
