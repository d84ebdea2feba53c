use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use roster_core::models::gpg_key::GpgKey;
use sqlx::SqlitePool;

type GpgKeyRow = (
    i64,
    i64,
    String,
    String,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
);

fn from_row(row: GpgKeyRow) -> GpgKey {
    let (id, user_id, fingerprint, key, expires_at, created_at) = row;
    GpgKey {
        id: Some(id),
        user_id,
        fingerprint,
        key,
        expires_at,
        created_at,
    }
}

pub struct GpgKeyRepository {
    pool: SqlitePool,
}

impl GpgKeyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a key. Re-uploading a fingerprint replaces the
    /// stored key material and expiry.
    pub async fn upsert(&self, key: &GpgKey) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO gpg_keys (user_id, fingerprint, key, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (user_id, fingerprint)
            DO UPDATE SET key = excluded.key, expires_at = excluded.expires_at
            "#,
        )
        .bind(key.user_id)
        .bind(&key.fingerprint)
        .bind(&key.key)
        .bind(key.expires_at)
        .bind(key.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to store GPG key")?;

        Ok(())
    }

    pub async fn find_by_user(&self, user_id: i64) -> Result<Vec<GpgKey>> {
        let rows = sqlx::query_as::<_, GpgKeyRow>(
            "SELECT id, user_id, fingerprint, key, expires_at, created_at
             FROM gpg_keys WHERE user_id = ? ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list GPG keys")?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    /// Keys usable for encrypting mail right now.
    pub async fn find_valid_by_user(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<GpgKey>> {
        let rows = sqlx::query_as::<_, GpgKeyRow>(
            "SELECT id, user_id, fingerprint, key, expires_at, created_at
             FROM gpg_keys
             WHERE user_id = ? AND (expires_at IS NULL OR expires_at >= ?)
             ORDER BY created_at",
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list valid GPG keys")?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    pub async fn delete_for_user(&self, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM gpg_keys WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete GPG keys")?;
        Ok(())
    }
}
