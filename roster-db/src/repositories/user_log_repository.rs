use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use roster_core::models::log_entry::UserLogEntry;
use sqlx::SqlitePool;

type LogEntryRow = (i64, i64, String, String, DateTime<Utc>);

fn from_row(row: LogEntryRow) -> UserLogEntry {
    let (id, user_id, address, message, created_at) = row;
    UserLogEntry {
        id: Some(id),
        user_id,
        address,
        message,
        created_at,
    }
}

pub struct UserLogRepository {
    pool: SqlitePool,
}

impl UserLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, entry: &UserLogEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_log_entries (user_id, address, message, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(entry.user_id)
        .bind(&entry.address)
        .bind(&entry.message)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to write user log entry")?;

        Ok(())
    }

    /// Most recent entries first, capped for display on the account page.
    pub async fn find_by_user(&self, user_id: i64, limit: i64) -> Result<Vec<UserLogEntry>> {
        let rows = sqlx::query_as::<_, LogEntryRow>(
            "SELECT id, user_id, address, message, created_at
             FROM user_log_entries
             WHERE user_id = ?
             ORDER BY created_at DESC
             LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to read user log")?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM user_log_entries WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("Failed to prune user log")?;

        Ok(result.rows_affected())
    }
}
