// Roster - membership and identity backend for an XMPP service provider
// Copyright (C) 2026 Roster Project Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use roster_core::models::blocklist::{merge_expiry, normalize_email};
use sqlx::SqlitePool;

pub struct BlockedEmailRepository {
    pool: SqlitePool,
}

impl BlockedEmailRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Block an address, normalizing it first. Re-blocking extends an
    /// existing block but never shortens it.
    pub async fn block(&self, address: &str, expires_at: Option<DateTime<Utc>>) -> Result<()> {
        let address = normalize_email(address);

        let current: Option<(Option<DateTime<Utc>>,)> =
            sqlx::query_as("SELECT expires_at FROM blocked_emails WHERE address = ?")
                .bind(&address)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to look up blocked email")?;

        let expires_at = match current {
            Some((current,)) => merge_expiry(current, expires_at),
            None => expires_at,
        };

        sqlx::query(
            "INSERT INTO blocked_emails (address, expires_at, created_at)
             VALUES (?, ?, ?)
             ON CONFLICT (address) DO UPDATE SET expires_at = excluded.expires_at",
        )
        .bind(&address)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to block email")?;

        Ok(())
    }

    pub async fn is_blocked(&self, address: &str, now: DateTime<Utc>) -> Result<bool> {
        let address = normalize_email(address);

        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM blocked_emails
             WHERE address = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(&address)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check blocked email")?;

        Ok(count.0 > 0)
    }

    pub async fn unblock(&self, address: &str) -> Result<()> {
        sqlx::query("DELETE FROM blocked_emails WHERE address = ?")
            .bind(normalize_email(address))
            .execute(&self.pool)
            .await
            .context("Failed to unblock email")?;
        Ok(())
    }

    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM blocked_emails WHERE expires_at IS NOT NULL AND expires_at <= ?",
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to delete expired email blocks")?;

        Ok(result.rows_affected())
    }
}

pub struct BlockedIpRepository {
    pool: SqlitePool,
}

impl BlockedIpRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn block(&self, address: &str, expires_at: Option<DateTime<Utc>>) -> Result<()> {
        let address = address.trim();

        let current: Option<(Option<DateTime<Utc>>,)> =
            sqlx::query_as("SELECT expires_at FROM blocked_ips WHERE address = ?")
                .bind(address)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to look up blocked IP")?;

        let expires_at = match current {
            Some((current,)) => merge_expiry(current, expires_at),
            None => expires_at,
        };

        sqlx::query(
            "INSERT INTO blocked_ips (address, expires_at, created_at)
             VALUES (?, ?, ?)
             ON CONFLICT (address) DO UPDATE SET expires_at = excluded.expires_at",
        )
        .bind(address)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to block IP")?;

        Ok(())
    }

    pub async fn is_blocked(&self, address: &str, now: DateTime<Utc>) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM blocked_ips
             WHERE address = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(address.trim())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check blocked IP")?;

        Ok(count.0 > 0)
    }

    pub async fn unblock(&self, address: &str) -> Result<()> {
        sqlx::query("DELETE FROM blocked_ips WHERE address = ?")
            .bind(address.trim())
            .execute(&self.pool)
            .await
            .context("Failed to unblock IP")?;
        Ok(())
    }

    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM blocked_ips WHERE expires_at IS NOT NULL AND expires_at <= ?")
                .bind(now)
                .execute(&self.pool)
                .await
                .context("Failed to delete expired IP blocks")?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::open_memory;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_email_block_matches_aliases() -> Result<()> {
        let pool = open_memory().await?;
        let repo = BlockedEmailRepository::new(pool);
        let now = Utc::now();

        repo.block("spammer@gmail.com", None).await?;

        assert!(repo.is_blocked("spammer@gmail.com", now).await?);
        assert!(repo.is_blocked("s.p.a.m.m.e.r@gmail.com", now).await?);
        assert!(repo.is_blocked("spammer+promo@gmail.com", now).await?);
        assert!(!repo.is_blocked("someone@gmail.com", now).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_reblock_extends_never_shortens() -> Result<()> {
        let pool = open_memory().await?;
        let repo = BlockedIpRepository::new(pool.clone());
        let now = Utc::now();
        let later = now + Duration::hours(4);

        repo.block("192.0.2.1", Some(later)).await?;
        // A shorter re-block must not shrink the window.
        repo.block("192.0.2.1", Some(now + Duration::hours(1))).await?;

        let (stored,): (Option<DateTime<Utc>>,) =
            sqlx::query_as("SELECT expires_at FROM blocked_ips WHERE address = ?")
                .bind("192.0.2.1")
                .fetch_one(&pool)
                .await?;
        assert_eq!(stored, Some(later));

        // Indefinite wins over any deadline.
        repo.block("192.0.2.1", None).await?;
        let (stored,): (Option<DateTime<Utc>>,) =
            sqlx::query_as("SELECT expires_at FROM blocked_ips WHERE address = ?")
                .bind("192.0.2.1")
                .fetch_one(&pool)
                .await?;
        assert_eq!(stored, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_expired_block_is_inactive_and_swept() -> Result<()> {
        let pool = open_memory().await?;
        let repo = BlockedEmailRepository::new(pool);
        let now = Utc::now();

        repo.block("old@example.com", Some(now - Duration::hours(1)))
            .await?;
        repo.block("current@example.com", Some(now + Duration::hours(1)))
            .await?;
        repo.block("forever@example.com", None).await?;

        assert!(!repo.is_blocked("old@example.com", now).await?);
        assert!(repo.is_blocked("current@example.com", now).await?);

        let removed = repo.delete_expired(now).await?;
        assert_eq!(removed, 1);

        // Indefinite blocks survive the sweep.
        assert!(repo.is_blocked("forever@example.com", now).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_unblock() -> Result<()> {
        let pool = open_memory().await?;
        let repo = BlockedIpRepository::new(pool);
        let now = Utc::now();

        repo.block("2001:db8::1", None).await?;
        assert!(repo.is_blocked("2001:db8::1", now).await?);

        repo.unblock("2001:db8::1").await?;
        assert!(!repo.is_blocked("2001:db8::1", now).await?);

        Ok(())
    }
}
