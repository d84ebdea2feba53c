use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use roster_core::models::confirmation::{Confirmation, Purpose};
use sqlx::SqlitePool;

type ConfirmationRow = (
    i64,
    String,
    i64,
    i64,
    String,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn from_row(row: ConfirmationRow) -> Result<Confirmation> {
    let (id, key, user_id, purpose, to, payload, address, expires_at, created_at) = row;

    Ok(Confirmation {
        id: Some(id),
        key,
        user_id,
        purpose: Purpose::from_i64(purpose)
            .with_context(|| format!("Unknown confirmation purpose: {}", purpose))?,
        to,
        payload: serde_json::from_str(&payload).context("Corrupt confirmation payload")?,
        address,
        expires_at,
        created_at,
    })
}

pub struct ConfirmationRepository {
    pool: SqlitePool,
}

impl ConfirmationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, confirmation: &Confirmation) -> Result<i64> {
        let payload =
            serde_json::to_string(&confirmation.payload).context("Failed to encode payload")?;

        let result = sqlx::query(
            r#"
            INSERT INTO confirmations
                (key, user_id, purpose, to_address, payload, address, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&confirmation.key)
        .bind(confirmation.user_id)
        .bind(confirmation.purpose.as_i64())
        .bind(&confirmation.to)
        .bind(payload)
        .bind(&confirmation.address)
        .bind(confirmation.expires_at)
        .bind(confirmation.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to create confirmation")?;

        Ok(result.last_insert_rowid())
    }

    /// Look up an unexpired confirmation by key, scoped to the purpose the
    /// handler expects. A register key can never redeem a delete, and vice
    /// versa.
    pub async fn find_valid(
        &self,
        key: &str,
        purpose: Purpose,
        now: DateTime<Utc>,
    ) -> Result<Option<Confirmation>> {
        let row = sqlx::query_as::<_, ConfirmationRow>(
            r#"
            SELECT id, key, user_id, purpose, to_address, payload, address,
                   expires_at, created_at
            FROM confirmations
            WHERE key = ? AND purpose = ? AND expires_at > ?
            "#,
        )
        .bind(key)
        .bind(purpose.as_i64())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find confirmation")?;

        row.map(from_row).transpose()
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM confirmations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete confirmation")?;
        Ok(())
    }

    /// Drop all outstanding confirmations for a user, e.g. when the account
    /// is deleted or the password changes.
    pub async fn delete_for_user(&self, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM confirmations WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user confirmations")?;
        Ok(())
    }

    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM confirmations WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .context("Failed to delete expired confirmations")?;

        Ok(result.rows_affected())
    }
}
