//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;
use std::path::Path;
use std::time::Duration;

use super::Database;

/// Schema version this build expects
pub const SCHEMA_VERSION: i64 = 1;

impl Database {
    /// Open the job store
    ///
    /// Creates the database file if it doesn't exist and runs migrations. This is
    /// the single startup point for the store: callers get a handle or a typed
    /// error, and are expected to exit when it fails.
    pub async fn new(path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        // Several worker processes share one file, so WAL mode and a generous busy timeout
        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let db = Self { pool };

        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        if Self::current_version(&mut conn).await? < 1 {
            Self::migrate_v1(&mut conn).await?;
        }

        Ok(())
    }

    async fn current_version(conn: &mut SqliteConnection) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to query schema version: {}",
                    e
                )))
            })?;

        Ok(version.unwrap_or(0))
    }

    /// Migration v1: job records and lists
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        // IMMEDIATE takes the write lock up front; a worker racing us on first start waits here
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to begin transaction: {}",
                    e
                )))
            })?;

        let result = async {
            if Self::current_version(conn).await? >= 1 {
                return Ok::<bool, Error>(false);
            }
            tracing::info!("Applying database migration v1");
            Self::create_job_records_table(conn).await?;
            Self::create_list_entries_table(conn).await?;
            Self::record_migration(conn, 1).await?;
            Ok(true)
        }
        .await;

        match result {
            Ok(applied) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        Error::Database(DatabaseError::MigrationFailed(format!(
                            "Failed to commit migration v1: {}",
                            e
                        )))
                    })?;
                if applied {
                    tracing::info!("Database migration v1 complete");
                }
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(e);
            }
        }

        Ok(())
    }

    /// Hash records: one row per key, fields stored as a JSON object of strings
    async fn create_job_records_table(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE job_records (
                key TEXT PRIMARY KEY,
                fields TEXT NOT NULL,
                expires_at INTEGER,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create job_records table: {}",
                e
            )))
        })?;

        sqlx::query("CREATE INDEX idx_job_records_expires_at ON job_records(expires_at)")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to create job_records index: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// FIFO lists: insertion order is the AUTOINCREMENT id
    async fn create_list_entries_table(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE list_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                list_key TEXT NOT NULL,
                payload TEXT NOT NULL,
                pushed_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create list_entries table: {}",
                e
            )))
        })?;

        sqlx::query("CREATE INDEX idx_list_entries_key ON list_entries(list_key, id)")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to create list_entries index: {}",
                    e
                )))
            })?;

        Ok(())
    }

    async fn record_migration(conn: &mut SqliteConnection, version: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to record migration: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Schema version currently recorded in the database
    pub async fn schema_version(&self) -> Result<i64> {
        let mut conn = self.acquire().await?;
        Self::current_version(&mut conn).await
    }

    /// Close the database connection
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
