use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use roster_core::models::certificate::Certificate;
use sqlx::SqlitePool;

type CertificateRow = (
    i64,
    String,
    String,
    String,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
    String,
    String,
    String,
    String,
    bool,
    DateTime<Utc>,
);

const CERT_COLUMNS: &str = "id, hostname, pem, hostnames, key_size, valid_from, valid_until, \
     serial, sha256, sha512, tlsa, enabled, created_at";

fn from_row(row: CertificateRow) -> Result<Certificate> {
    let (
        id,
        hostname,
        pem,
        hostnames,
        key_size,
        valid_from,
        valid_until,
        serial,
        sha256,
        sha512,
        tlsa,
        enabled,
        created_at,
    ) = row;

    Ok(Certificate {
        id: Some(id),
        hostname,
        pem,
        hostnames: serde_json::from_str(&hostnames).context("Corrupt hostname list")?,
        key_size,
        valid_from,
        valid_until,
        serial,
        sha256,
        sha512,
        tlsa,
        enabled,
        created_at,
    })
}

pub struct CertificateRepository {
    pool: SqlitePool,
}

impl CertificateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, cert: &Certificate) -> Result<i64> {
        let hostnames =
            serde_json::to_string(&cert.hostnames).context("Failed to encode hostname list")?;

        let result = sqlx::query(
            r#"
            INSERT INTO certificates
                (hostname, pem, hostnames, key_size, valid_from, valid_until,
                 serial, sha256, sha512, tlsa, enabled, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&cert.hostname)
        .bind(&cert.pem)
        .bind(hostnames)
        .bind(cert.key_size)
        .bind(cert.valid_from)
        .bind(cert.valid_until)
        .bind(&cert.serial)
        .bind(&cert.sha256)
        .bind(&cert.sha512)
        .bind(&cert.tlsa)
        .bind(cert.enabled)
        .bind(cert.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to create certificate")?;

        Ok(result.last_insert_rowid())
    }

    /// The certificate currently served for a hostname: enabled, within its
    /// validity window, newest first when several overlap.
    pub async fn find_current(
        &self,
        hostname: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Certificate>> {
        let row = sqlx::query_as::<_, CertificateRow>(&format!(
            "SELECT {} FROM certificates
             WHERE hostname = ? AND enabled = 1 AND valid_from < ? AND valid_until > ?
             ORDER BY valid_from DESC
             LIMIT 1",
            CERT_COLUMNS
        ))
        .bind(hostname)
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find certificate")?;

        row.map(from_row).transpose()
    }

    /// Hostnames with at least one enabled certificate on record.
    pub async fn list_hostnames(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT hostname FROM certificates WHERE enabled = 1 ORDER BY hostname",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list certificate hostnames")?;

        Ok(rows.into_iter().map(|(h,)| h).collect())
    }

    pub async fn set_enabled(&self, id: i64, enabled: bool) -> Result<()> {
        sqlx::query("UPDATE certificates SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to toggle certificate")?;
        Ok(())
    }
}
