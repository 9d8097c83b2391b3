//! Status Migrator: moves a job record from one status namespace to another.

use crate::db::Database;
use crate::types::{Fields, JobId, JobKey, JobStatus, fields};
use crate::Result;
use std::time::Duration;

/// Moves job records between status namespaces, renewing their TTL
#[derive(Clone)]
pub struct StatusMigrator {
    db: Database,
    ttl: Duration,
}

impl StatusMigrator {
    /// Create a migrator writing records with the given time-to-live
    pub fn new(db: Database, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    fn transition_fields(new_status: JobStatus, extra: &Fields) -> Fields {
        let mut merged = extra.clone();
        merged.insert(fields::STATUS.to_string(), new_status.as_str().to_string());
        merged
    }

    /// Move the record at `old_key` to `new_status`, merging in `extra`
    ///
    /// A missing record is treated as empty. The write, TTL renewal and
    /// removal of the old key commit together, so the old address stops
    /// resolving as the new one appears. Moving to the same status is a field
    /// merge with TTL renewal.
    pub async fn migrate(
        &self,
        old_key: &JobKey,
        new_status: JobStatus,
        extra: &Fields,
    ) -> Result<JobKey> {
        let new_key = old_key.with_status(new_status);
        let merged = Self::transition_fields(new_status, extra);

        self.db
            .move_hash(&old_key.to_string(), &new_key.to_string(), &merged, self.ttl)
            .await?;

        tracing::debug!(
            job_id = %old_key.job_id,
            from = %old_key.status,
            to = %new_status,
            "job record migrated"
        );

        Ok(new_key)
    }

    /// Like [`migrate`](Self::migrate), but only if `old_key` still resolves
    ///
    /// Returns `None` when another worker got there first.
    pub async fn claim(
        &self,
        old_key: &JobKey,
        new_status: JobStatus,
        extra: &Fields,
    ) -> Result<Option<JobKey>> {
        let new_key = old_key.with_status(new_status);
        let merged = Self::transition_fields(new_status, extra);

        let claimed = self
            .db
            .claim_hash(&old_key.to_string(), &new_key.to_string(), &merged, self.ttl)
            .await?;

        if claimed {
            tracing::debug!(
                job_id = %old_key.job_id,
                from = %old_key.status,
                to = %new_status,
                "job record claimed"
            );
            Ok(Some(new_key))
        } else {
            tracing::debug!(key = %old_key, "claim lost, record already moved");
            Ok(None)
        }
    }

    /// Add `delta` to the failure count of the record at `key`
    pub async fn increment_failed_count(&self, key: &JobKey, delta: i64) -> Result<i64> {
        self.db
            .hash_incr(&key.to_string(), fields::FAILED_COUNT, delta)
            .await
    }

    /// The live record of `job_id` in any status namespace, if there is one
    pub async fn locate(&self, namespace: &str, job_id: &JobId) -> Result<Option<JobKey>> {
        for status in JobStatus::ALL {
            let key = JobKey::new(namespace, status, job_id.clone());
            if self.db.hash_exists(&key.to_string()).await? {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    /// Current fields of the record at `key`
    pub async fn read(&self, key: &JobKey) -> Result<Fields> {
        self.db.hash_get_all(&key.to_string()).await
    }
}
