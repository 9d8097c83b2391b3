//! FIFO lists used as queues.

use crate::error::DatabaseError;
use crate::utils::deadline_after;
use crate::{Error, Result};
use std::time::Duration;
use tokio::time::Instant;

use super::{Database, unix_now};

impl Database {
    /// Append a payload to the tail of a list; returns the new length
    pub async fn list_push(&self, list_key: &str, payload: &str) -> Result<u64> {
        sqlx::query("INSERT INTO list_entries (list_key, payload, pushed_at) VALUES (?, ?, ?)")
            .bind(list_key)
            .bind(payload)
            .bind(unix_now())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to push onto {}: {}",
                    list_key, e
                )))
            })?;

        self.list_len(list_key).await
    }

    /// Remove and return the head of a list
    ///
    /// The select and delete are one statement, so each entry is handed to
    /// exactly one caller even with many processes popping concurrently.
    pub async fn list_pop(&self, list_key: &str) -> Result<Option<String>> {
        sqlx::query_scalar(
            r#"
            DELETE FROM list_entries
            WHERE id = (
                SELECT id FROM list_entries WHERE list_key = ? ORDER BY id LIMIT 1
            )
            RETURNING payload
            "#,
        )
        .bind(list_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to pop from {}: {}",
                list_key, e
            )))
        })
    }

    /// Pop the head of a list, waiting up to `timeout` for an entry to arrive
    ///
    /// Returns `None` once the deadline passes with the list still empty.
    pub async fn blocking_pop(
        &self,
        list_key: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Option<String>> {
        let deadline = deadline_after(timeout);
        let poll_interval = poll_interval.max(Duration::from_millis(10));

        loop {
            if let Some(payload) = self.list_pop(list_key).await? {
                return Ok(Some(payload));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(poll_interval.min(deadline - now)).await;
        }
    }

    /// Up to `limit` entries from the head of a list without removing them
    pub async fn list_range(&self, list_key: &str, limit: Option<u64>) -> Result<Vec<String>> {
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        sqlx::query_scalar(
            "SELECT payload FROM list_entries WHERE list_key = ? ORDER BY id LIMIT ?",
        )
        .bind(list_key)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to read {}: {}",
                list_key, e
            )))
        })
    }

    /// Number of entries in a list
    pub async fn list_len(&self, list_key: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM list_entries WHERE list_key = ?")
            .bind(list_key)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count {}: {}",
                    list_key, e
                )))
            })?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}
