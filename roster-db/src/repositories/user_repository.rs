use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use roster_core::models::jid::Jid;
use roster_core::models::user::{RegistrationMethod, User};
use sqlx::SqlitePool;

type UserRow = (
    i64,                   // id
    String,                // jid
    Option<String>,        // email
    String,                // password_hash
    Option<String>,        // gpg_fingerprint
    i64,                   // registration_method
    DateTime<Utc>,         // registered_at
    Option<DateTime<Utc>>, // confirmed_at
    DateTime<Utc>,         // last_activity
    Option<DateTime<Utc>>, // expiry_notified_at
    bool,                  // blocked
    bool,                  // is_admin
    bool,                  // created_in_backend
    bool,                  // notify_account_expires
    bool,                  // notify_gpg_expires
);

const USER_COLUMNS: &str = "id, jid, email, password_hash, gpg_fingerprint, \
     registration_method, registered_at, confirmed_at, last_activity, \
     expiry_notified_at, blocked, is_admin, created_in_backend, \
     notify_account_expires, notify_gpg_expires";

fn from_row(row: UserRow) -> Result<User> {
    let (
        id,
        jid,
        email,
        password_hash,
        gpg_fingerprint,
        registration_method,
        registered_at,
        confirmed_at,
        last_activity,
        expiry_notified_at,
        blocked,
        is_admin,
        created_in_backend,
        notify_account_expires,
        notify_gpg_expires,
    ) = row;

    Ok(User {
        id: Some(id),
        jid: Jid::parse(&jid).map_err(|e| anyhow::anyhow!("Corrupt JID in database: {}", e))?,
        email,
        password_hash,
        gpg_fingerprint,
        registration_method: RegistrationMethod::from_i64(registration_method),
        registered_at,
        confirmed_at,
        last_activity,
        expiry_notified_at,
        blocked,
        is_admin,
        created_in_backend,
        notify_account_expires,
        notify_gpg_expires,
    })
}

pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user: &User) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (
                jid, email, password_hash, gpg_fingerprint, registration_method,
                registered_at, confirmed_at, last_activity, expiry_notified_at,
                blocked, is_admin, created_in_backend,
                notify_account_expires, notify_gpg_expires
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.jid.to_string())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.gpg_fingerprint)
        .bind(user.registration_method.as_i64())
        .bind(user.registered_at)
        .bind(user.confirmed_at)
        .bind(user.last_activity)
        .bind(user.expiry_notified_at)
        .bind(user.blocked)
        .bind(user.is_admin)
        .bind(user.created_in_backend)
        .bind(user.notify_account_expires)
        .bind(user.notify_gpg_expires)
        .execute(&self.pool)
        .await
        .context("Failed to create user")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find user by id")?;

        row.map(from_row).transpose()
    }

    pub async fn find_by_jid(&self, jid: &Jid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE jid = ?",
            USER_COLUMNS
        ))
        .bind(jid.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find user by JID")?;

        row.map(from_row).transpose()
    }

    pub async fn jid_exists(&self, jid: &Jid) -> Result<bool> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE jid = ?")
            .bind(jid.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to check JID existence")?;

        Ok(count.0 > 0)
    }

    /// Persist every mutable field of an existing user.
    pub async fn update(&self, user: &User) -> Result<()> {
        let id = user.id.context("Cannot update a user without an id")?;

        sqlx::query(
            r#"
            UPDATE users SET
                email = ?, password_hash = ?, gpg_fingerprint = ?,
                confirmed_at = ?, last_activity = ?, expiry_notified_at = ?,
                blocked = ?, is_admin = ?, created_in_backend = ?,
                notify_account_expires = ?, notify_gpg_expires = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.gpg_fingerprint)
        .bind(user.confirmed_at)
        .bind(user.last_activity)
        .bind(user.expiry_notified_at)
        .bind(user.blocked)
        .bind(user.is_admin)
        .bind(user.created_in_backend)
        .bind(user.notify_account_expires)
        .bind(user.notify_gpg_expires)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update user")?;

        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let rows = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?
            .rows_affected();

        if rows == 0 {
            return Err(anyhow::anyhow!("User not found"));
        }

        Ok(())
    }

    pub async fn list_all(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY jid",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;

        rows.into_iter().map(from_row).collect()
    }

    pub async fn set_last_activity(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_activity = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update last activity")?;
        Ok(())
    }

    pub async fn set_expiry_notified(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET expiry_notified_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to record expiry notification")?;
        Ok(())
    }

    /// Users idle since `cutoff` that have not been warned since they were
    /// last active. These are due for an expiry warning mail.
    pub async fn find_unnotified_idle_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users
             WHERE last_activity <= ?
               AND (expiry_notified_at IS NULL OR expiry_notified_at < last_activity)",
            USER_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .context("Failed to find expiring users")?;

        rows.into_iter().map(from_row).collect()
    }

    /// Users idle since `cutoff`, regardless of notification state. These
    /// are due for removal.
    pub async fn find_idle_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE last_activity <= ?",
            USER_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .context("Failed to find idle users")?;

        rows.into_iter().map(from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::open_memory;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn test_user(jid: &str) -> User {
        User::new(
            Jid::parse(jid).unwrap(),
            Some(format!("{}@mail.example", jid.split('@').next().unwrap())),
            "password123",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find() -> Result<()> {
        let pool = open_memory().await?;
        let repo = UserRepository::new(pool);

        let user = test_user("alice@example.com");
        let id = repo.create(&user).await?;

        let found = repo.find_by_id(id).await?.unwrap();
        assert_eq!(found.jid.to_string(), "alice@example.com");
        assert_eq!(found.email.as_deref(), Some("alice@mail.example"));
        assert_eq!(found.registration_method, RegistrationMethod::Website);
        assert!(!found.blocked);

        let by_jid = repo
            .find_by_jid(&Jid::parse("alice@example.com").unwrap())
            .await?;
        assert_eq!(by_jid.unwrap().id, Some(id));

        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_jid_fails() -> Result<()> {
        let pool = open_memory().await?;
        let repo = UserRepository::new(pool);

        repo.create(&test_user("alice@example.com")).await?;
        let result = repo.create(&test_user("alice@example.com")).await;
        assert!(result.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_jid_exists() -> Result<()> {
        let pool = open_memory().await?;
        let repo = UserRepository::new(pool);

        let jid = Jid::parse("bob@example.com").unwrap();
        assert!(!repo.jid_exists(&jid).await?);

        repo.create(&test_user("bob@example.com")).await?;
        assert!(repo.jid_exists(&jid).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_update() -> Result<()> {
        let pool = open_memory().await?;
        let repo = UserRepository::new(pool);

        let mut user = test_user("alice@example.com");
        let id = repo.create(&user).await?;
        user.id = Some(id);

        user.confirm();
        user.blocked = true;
        user.notify_account_expires = false;
        repo.update(&user).await?;

        let found = repo.find_by_id(id).await?.unwrap();
        assert!(found.confirmed_at.is_some());
        assert!(found.blocked);
        assert!(!found.notify_account_expires);

        Ok(())
    }

    #[tokio::test]
    async fn test_delete() -> Result<()> {
        let pool = open_memory().await?;
        let repo = UserRepository::new(pool);

        let id = repo.create(&test_user("alice@example.com")).await?;
        repo.delete(id).await?;
        assert!(repo.find_by_id(id).await?.is_none());

        assert!(repo.delete(id).await.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_expiry_queries() -> Result<()> {
        let pool = open_memory().await?;
        let repo = UserRepository::new(pool);
        let now = Utc::now();

        let idle_id = repo.create(&test_user("idle@example.com")).await?;
        let active_id = repo.create(&test_user("active@example.com")).await?;

        repo.set_last_activity(idle_id, now - Duration::days(400))
            .await?;
        repo.set_last_activity(active_id, now - Duration::days(3))
            .await?;

        let cutoff = now - Duration::days(355);

        let expiring = repo.find_unnotified_idle_since(cutoff).await?;
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].jid.to_string(), "idle@example.com");

        // After notification the user is no longer due for a warning...
        repo.set_expiry_notified(idle_id, now).await?;
        assert!(repo.find_unnotified_idle_since(cutoff).await?.is_empty());

        // ...but still counts as idle for removal.
        let idle = repo.find_idle_since(cutoff).await?;
        assert_eq!(idle.len(), 1);

        Ok(())
    }
}
