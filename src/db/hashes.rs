//! Hash records: string fields under one key, with an optional expiry.

use crate::error::DatabaseError;
use crate::types::Fields;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use std::time::Duration;

use super::{Database, unix_now};

fn expiry_after(now: i64, ttl: Duration) -> i64 {
    now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
}

fn decode_fields(key: &str, raw: &str) -> Result<Fields> {
    serde_json::from_str(raw).map_err(|e| {
        Error::Database(DatabaseError::CorruptRecord {
            key: key.to_string(),
            reason: e.to_string(),
        })
    })
}

/// Live fields and expiry of `key`; expired rows read as missing
async fn read_fields(
    conn: &mut SqliteConnection,
    key: &str,
    now: i64,
) -> Result<Option<(Fields, Option<i64>)>> {
    let row: Option<(String, Option<i64>)> = sqlx::query_as(
        r#"
        SELECT fields, expires_at FROM job_records
        WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)
        "#,
    )
    .bind(key)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| {
        Error::Database(DatabaseError::QueryFailed(format!(
            "Failed to read record {}: {}",
            key, e
        )))
    })?;

    match row {
        Some((raw, expires_at)) => Ok(Some((decode_fields(key, &raw)?, expires_at))),
        None => Ok(None),
    }
}

async fn write_fields(
    conn: &mut SqliteConnection,
    key: &str,
    fields: &Fields,
    expires_at: Option<i64>,
    now: i64,
) -> Result<()> {
    let raw = serde_json::to_string(fields)?;
    sqlx::query(
        r#"
        INSERT INTO job_records (key, fields, expires_at, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET
            fields = excluded.fields,
            expires_at = excluded.expires_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(raw)
    .bind(expires_at)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        Error::Database(DatabaseError::QueryFailed(format!(
            "Failed to write record {}: {}",
            key, e
        )))
    })?;

    Ok(())
}

async fn delete_row(conn: &mut SqliteConnection, key: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM job_records WHERE key = ?")
        .bind(key)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to delete record {}: {}",
                key, e
            )))
        })?;

    Ok(result.rows_affected())
}

/// Merge `extra` onto whatever lives at `old` and `new`, store it at `new`, drop `old`
async fn move_within(
    conn: &mut SqliteConnection,
    old_key: &str,
    new_key: &str,
    extra: &Fields,
    ttl: Duration,
    now: i64,
) -> Result<()> {
    let mut merged = read_fields(conn, old_key, now)
        .await?
        .map(|(fields, _)| fields)
        .unwrap_or_default();

    if old_key != new_key
        && let Some((existing, _)) = read_fields(conn, new_key, now).await?
    {
        // A leftover record at the destination keeps its fields unless overwritten
        for (name, value) in existing {
            merged.entry(name).or_insert(value);
        }
    }

    merged.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    write_fields(conn, new_key, &merged, Some(expiry_after(now, ttl)), now).await?;

    if old_key != new_key {
        delete_row(conn, old_key).await?;
    }

    Ok(())
}

impl Database {
    /// All fields of a hash; a missing or expired key reads as empty
    pub async fn hash_get_all(&self, key: &str) -> Result<Fields> {
        let mut conn = self.acquire().await?;
        Ok(read_fields(&mut conn, key, unix_now())
            .await?
            .map(|(fields, _)| fields)
            .unwrap_or_default())
    }

    /// Check whether a live record exists at `key`
    pub async fn hash_exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.acquire().await?;
        Ok(read_fields(&mut conn, key, unix_now()).await?.is_some())
    }

    /// Merge fields into a hash, creating it when missing
    ///
    /// An existing expiry is kept; a newly created hash has none.
    pub async fn hash_set(&self, key: &str, fields: &Fields) -> Result<()> {
        let mut conn = self.acquire().await?;
        Self::begin_immediate(&mut conn).await?;

        let result = async {
            let now = unix_now();
            let (mut current, expires_at) = read_fields(&mut conn, key, now)
                .await?
                .unwrap_or_default();
            current.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            write_fields(&mut conn, key, &current, expires_at, now).await
        }
        .await;

        Self::finish(&mut conn, result).await
    }

    /// Add `delta` to an integer field and return the new value
    ///
    /// A missing field counts as zero. A field holding anything other than an
    /// integer is an error and leaves the record untouched.
    pub async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut conn = self.acquire().await?;
        Self::begin_immediate(&mut conn).await?;

        let result = async {
            let now = unix_now();
            let (mut current, expires_at) = read_fields(&mut conn, key, now)
                .await?
                .unwrap_or_default();

            let value = match current.get(field) {
                Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                    Error::Database(DatabaseError::CorruptRecord {
                        key: key.to_string(),
                        reason: format!("field {} is not an integer: {:?}", field, raw),
                    })
                })?,
                None => 0,
            };
            let updated = value.saturating_add(delta);
            current.insert(field.to_string(), updated.to_string());
            write_fields(&mut conn, key, &current, expires_at, now).await?;
            Ok::<i64, Error>(updated)
        }
        .await;

        Self::finish(&mut conn, result).await
    }

    /// Set a time-to-live on a live record; returns false when the key doesn't resolve
    pub async fn hash_expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = unix_now();
        let result = sqlx::query(
            r#"
            UPDATE job_records SET expires_at = ?, updated_at = ?
            WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(expiry_after(now, ttl))
        .bind(now)
        .bind(key)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set expiry on {}: {}",
                key, e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a record; returns whether a row was removed
    pub async fn delete_key(&self, key: &str) -> Result<bool> {
        let mut conn = self.acquire().await?;
        Ok(delete_row(&mut conn, key).await? > 0)
    }

    /// Live keys starting with `prefix`, in key order
    pub async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT key FROM job_records
            WHERE substr(key, 1, length(?)) = ?
              AND (expires_at IS NULL OR expires_at > ?)
            ORDER BY key
            "#,
        )
        .bind(prefix)
        .bind(prefix)
        .bind(unix_now())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to scan prefix {}: {}",
                prefix, e
            )))
        })
    }

    /// Live records starting with `prefix` together with their fields, in key order
    ///
    /// Records whose fields cannot be decoded are skipped with a warning.
    pub async fn scan_prefix_with_fields(&self, prefix: &str) -> Result<Vec<(String, Fields)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT key, fields FROM job_records
            WHERE substr(key, 1, length(?)) = ?
              AND (expires_at IS NULL OR expires_at > ?)
            ORDER BY key
            "#,
        )
        .bind(prefix)
        .bind(prefix)
        .bind(unix_now())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to scan prefix {}: {}",
                prefix, e
            )))
        })?;

        Ok(rows
            .into_iter()
            .filter_map(|(key, raw)| match decode_fields(&key, &raw) {
                Ok(fields) => Some((key, fields)),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "skipping unreadable record");
                    None
                }
            })
            .collect())
    }

    /// Physically remove expired records; returns how many were removed
    pub async fn purge_expired(&self) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM job_records WHERE expires_at IS NOT NULL AND expires_at <= ?")
                .bind(unix_now())
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to purge expired records: {}",
                        e
                    )))
                })?;

        Ok(result.rows_affected())
    }

    /// Move a record to `new_key`, merging in `extra` and renewing its TTL
    ///
    /// Runs in one transaction, so readers never see the record at both keys.
    /// A missing source reads as empty; when `old_key == new_key` this is a
    /// field merge plus TTL renewal.
    pub async fn move_hash(
        &self,
        old_key: &str,
        new_key: &str,
        extra: &Fields,
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.acquire().await?;
        Self::begin_immediate(&mut conn).await?;
        let result = move_within(&mut conn, old_key, new_key, extra, ttl, unix_now()).await;
        Self::finish(&mut conn, result).await
    }

    /// Move a record only if `old_key` still resolves
    ///
    /// Returns false, changing nothing, when another caller moved or deleted
    /// the record first.
    pub async fn claim_hash(
        &self,
        old_key: &str,
        new_key: &str,
        extra: &Fields,
        ttl: Duration,
    ) -> Result<bool> {
        let mut conn = self.acquire().await?;
        Self::begin_immediate(&mut conn).await?;

        let result = async {
            let now = unix_now();
            if read_fields(&mut conn, old_key, now).await?.is_none() {
                return Ok(false);
            }
            move_within(&mut conn, old_key, new_key, extra, ttl, now).await?;
            Ok::<bool, Error>(true)
        }
        .await;

        Self::finish(&mut conn, result).await
    }
}
