use crate::db::*;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_database_creation() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let mut conn = db.pool.acquire().await.unwrap();
    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .fetch_all(&mut *conn)
            .await
            .unwrap();

    assert!(tables.contains(&"job_records".to_string()));
    assert!(tables.contains(&"list_entries".to_string()));
    assert!(tables.contains(&"schema_version".to_string()));
    drop(conn);

    assert_eq!(db.schema_version().await.unwrap(), migrations::SCHEMA_VERSION);

    db.close().await;
}

#[tokio::test]
async fn test_reopen_keeps_data_and_version() {
    let temp_file = NamedTempFile::new().unwrap();

    {
        let db = Database::new(temp_file.path()).await.unwrap();
        db.list_push("q", "first").await.unwrap();
        db.close().await;
    }

    let db = Database::new(temp_file.path()).await.unwrap();
    assert_eq!(db.schema_version().await.unwrap(), 1);
    assert_eq!(db.list_range("q", None).await.unwrap(), vec!["first"]);

    let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(versions, 1, "migration must be recorded once");

    db.close().await;
}

#[tokio::test]
async fn test_creates_missing_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("store").join("jobs.db");

    let db = Database::new(&path).await.unwrap();
    assert!(path.exists());

    db.close().await;
}
