//! Job lifecycle on top of the store
//!
//! - [`StatusMigrator`] moves a record between status namespaces
//! - [`RetryScanner`] finds failed jobs that may run again
//! - [`Enqueuer`] feeds the submission queue and the scheduled-request list

use crate::db::Database;
use crate::types::{JobKey, JobRecord, JobStatus};
use crate::Result;

mod enqueue;
mod migrator;
mod retry_scanner;

pub use enqueue::Enqueuer;
pub use migrator::StatusMigrator;
pub use retry_scanner::RetryScanner;

/// Every live record in one status namespace, in key order
pub async fn list_jobs(
    db: &Database,
    namespace: &str,
    status: JobStatus,
) -> Result<Vec<JobRecord>> {
    let prefix = JobKey::status_prefix(namespace, status);
    let rows = db.scan_prefix_with_fields(&prefix).await?;

    Ok(rows
        .into_iter()
        .filter_map(|(raw_key, fields)| {
            JobKey::parse(namespace, &raw_key).map(|key| JobRecord::from_fields(&key, &fields))
        })
        .collect())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
