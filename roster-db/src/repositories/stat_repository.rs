use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use roster_core::models::stat::StatEvent;
use sqlx::SqlitePool;

pub struct StatRepository {
    pool: SqlitePool,
}

impl StatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, event: &StatEvent) -> Result<()> {
        sqlx::query("INSERT INTO stat_events (metric, value, stamp) VALUES (?, ?, ?)")
            .bind(&event.metric)
            .bind(event.value)
            .bind(event.stamp)
            .execute(&self.pool)
            .await
            .context("Failed to record stat event")?;

        Ok(())
    }

    pub async fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<StatEvent>> {
        let rows: Vec<(i64, String, i64, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, metric, value, stamp FROM stat_events WHERE stamp >= ? ORDER BY stamp",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list stat events")?;

        Ok(rows
            .into_iter()
            .map(|(id, metric, value, stamp)| StatEvent {
                id: Some(id),
                metric,
                value,
                stamp,
            })
            .collect())
    }

    pub async fn sum_since(&self, metric: &str, since: DateTime<Utc>) -> Result<i64> {
        let (sum,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(value), 0) FROM stat_events WHERE metric = ? AND stamp >= ?",
        )
        .bind(metric)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum stat events")?;

        Ok(sum)
    }
}
