use crate::db::Database;
use crate::types::{Fields, JobId, JobKey, JobStatus, JobSpec, fields, pending_fields};
use std::time::Duration;
use tempfile::NamedTempFile;


const NS: &str = "test:jobs";
const TTL: Duration = Duration::from_secs(3600);

async fn open_db() -> (NamedTempFile, Database) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (temp_file, db)
}

fn key(status: JobStatus, id: &str) -> JobKey {
    JobKey::new(NS, status, JobId::from(id))
}

/// Store a record directly in `status` with the given failure count
async fn seed(db: &Database, status: JobStatus, id: &str, failures: u32) -> JobKey {
    let job_key = key(status, id);
    let mut record = pending_fields(&JobSpec::new(format!("https://v.example/{id}")), 1_700_000_000);
    record.insert(fields::STATUS.into(), status.as_str().into());
    record.insert(fields::FAILED_COUNT.into(), failures.to_string());
    db.hash_set(&job_key.to_string(), &record).await.unwrap();
    job_key
}

fn extra(pairs: &[(&str, &str)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_list_jobs_returns_one_namespace() {
    let (_file, db) = open_db().await;
    seed(&db, JobStatus::Failed, "a", 2).await;
    seed(&db, JobStatus::Failed, "b", 0).await;
    seed(&db, JobStatus::Completed, "c", 0).await;

    let failed = super::list_jobs(&db, NS, JobStatus::Failed).await.unwrap();
    let ids: Vec<_> = failed.iter().map(|r| r.job_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(failed[0].failed_count, 2);
    assert_eq!(failed[0].status, JobStatus::Failed);

    db.close().await;
}
