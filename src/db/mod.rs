//! Job store for mediaq
//!
//! A small Redis-shaped store on top of SQLite: string-field hashes with an
//! optional expiry, and FIFO lists. Several worker processes and the API share
//! one database file.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by data structure:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`hashes`] - Hash records: read, merge, counters, TTL, prefix scans, moves
//! - [`lists`] - FIFO lists: push, exactly-once pop, blocking pop

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{Sqlite, SqlitePool};
use sqlx::SqliteConnection;

mod hashes;
mod lists;
mod migrations;

/// Database handle for mediaq
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })
    }

    /// Start a write transaction holding the database lock from the first statement
    async fn begin_immediate(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to begin transaction: {}",
                    e
                )))
            })?;
        Ok(())
    }

    /// Commit on success, roll back on error
    async fn finish<T>(conn: &mut SqliteConnection, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        Error::Database(DatabaseError::QueryFailed(format!(
                            "Failed to commit transaction: {}",
                            e
                        )))
                    })?;
                Ok(value)
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }
}

/// Current Unix time in seconds
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
