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

use anyhow::Result;
use chrono::{Duration, Utc};
use roster_db::repositories::{
    BlockedEmailRepository, BlockedIpRepository, ConfirmationRepository, SessionRepository,
    UserLogRepository, UserRepository,
};
use roster_web::mailer::{Mailer, OutgoingMail};
use roster_xmpp::XmppBackend;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Everything the sweeps need to know beyond the database and the backend.
#[derive(Debug, Clone)]
pub struct SweepSettings {
    /// Base URL used in warning mails, e.g. `https://example.com`.
    pub base_url: String,
    /// Idle days after which an account is removed. `None` disables both
    /// the warning and the removal sweep.
    pub account_expires_days: Option<i64>,
    /// Days before removal at which the warning mail goes out.
    pub account_expires_notification_days: i64,
    pub user_log_retention_days: i64,
}

pub async fn expire_confirmations(db: &SqlitePool) -> Result<u64> {
    ConfirmationRepository::new(db.clone())
        .delete_expired(Utc::now())
        .await
}

pub async fn expire_sessions(db: &SqlitePool) -> Result<u64> {
    SessionRepository::new(db.clone())
        .delete_expired(Utc::now())
        .await
}

/// Delete blocklist rows past their expiry. Indefinite blocks (no expiry)
/// are never touched.
pub async fn expire_blocklists(db: &SqlitePool) -> Result<u64> {
    let now = Utc::now();
    let emails = BlockedEmailRepository::new(db.clone())
        .delete_expired(now)
        .await?;
    let ips = BlockedIpRepository::new(db.clone())
        .delete_expired(now)
        .await?;
    Ok(emails + ips)
}

pub async fn expire_log_entries(db: &SqlitePool, retention_days: i64) -> Result<u64> {
    let cutoff = Utc::now() - Duration::days(retention_days);
    UserLogRepository::new(db.clone())
        .delete_older_than(cutoff)
        .await
}

/// Pull `last_activity` per account from the backend directory and update
/// local rows that have fallen behind. The backend only knows accounts that
/// were actually created there.
pub async fn sync_last_activity(db: &SqlitePool, xmpp: &dyn XmppBackend) -> Result<u64> {
    let repo = UserRepository::new(db.clone());
    let mut updated = 0;

    for user in repo.list_all().await? {
        if !user.created_in_backend {
            continue;
        }
        let id = match user.id {
            Some(id) => id,
            None => continue,
        };

        let seen = match xmpp.last_activity(&user.jid).await {
            Ok(seen) => seen,
            Err(e) => {
                warn!(jid = %user.jid, "Failed to query last activity: {:#}", e);
                continue;
            }
        };

        if let Some(seen) = seen {
            if seen > user.last_activity {
                repo.set_last_activity(id, seen).await?;
                updated += 1;
            }
        }
    }

    Ok(updated)
}

/// Warn accounts that will be removed soon. Each account is warned at most
/// once per activity period, tracked via `expiry_notified_at`.
pub async fn notify_expiring_accounts(
    db: &SqlitePool,
    mailer: &dyn Mailer,
    settings: &SweepSettings,
) -> Result<u64> {
    let expires_days = match settings.account_expires_days {
        Some(days) => days,
        None => return Ok(0),
    };

    let now = Utc::now();
    let cutoff = now - Duration::days(expires_days - settings.account_expires_notification_days);
    let repo = UserRepository::new(db.clone());
    let mut notified = 0;

    for user in repo.find_unnotified_idle_since(cutoff).await? {
        let id = match user.id {
            Some(id) => id,
            None => continue,
        };
        let email = match (&user.email, user.notify_account_expires) {
            (Some(email), true) => email.clone(),
            _ => continue,
        };

        let removal_date = user.last_activity + Duration::days(expires_days);
        let body = format!(
            "Your account {} has been inactive and will be removed on {}.\n\n\
             Log in at {}/login to keep it.\n",
            user.jid,
            removal_date.format("%Y-%m-%d"),
            settings.base_url,
        );

        mailer
            .send(OutgoingMail {
                to: email,
                subject: "Your account expires soon".to_string(),
                body,
                gpg_fingerprint: user.gpg_fingerprint.clone(),
            })
            .await?;

        repo.set_expiry_notified(id, now).await?;
        notified += 1;
    }

    Ok(notified)
}

/// Remove accounts idle past the expiry window, from the backend first and
/// then locally. A failed backend removal leaves the local row in place so
/// the next run retries it.
pub async fn remove_expired_accounts(
    db: &SqlitePool,
    xmpp: &dyn XmppBackend,
    settings: &SweepSettings,
) -> Result<u64> {
    let expires_days = match settings.account_expires_days {
        Some(days) => days,
        None => return Ok(0),
    };

    let cutoff = Utc::now() - Duration::days(expires_days);
    let repo = UserRepository::new(db.clone());
    let mut removed = 0;

    for user in repo.find_idle_since(cutoff).await? {
        let id = match user.id {
            Some(id) => id,
            None => continue,
        };

        if user.created_in_backend {
            if let Err(e) = xmpp.remove_user(&user.jid).await {
                warn!(jid = %user.jid, "Failed to remove account from backend: {:#}", e);
                continue;
            }
        }

        repo.delete(id).await?;
        info!(jid = %user.jid, "Removed expired account");
        removed += 1;
    }

    Ok(removed)
}

/// Run every sweep once, logging failures and moving on.
pub async fn run_all(
    db: &SqlitePool,
    xmpp: &dyn XmppBackend,
    mailer: &dyn Mailer,
    settings: &SweepSettings,
) {
    match expire_confirmations(db).await {
        Ok(n) if n > 0 => info!("Deleted {} expired confirmations", n),
        Ok(_) => {}
        Err(e) => warn!("expire_confirmations failed: {:#}", e),
    }
    match expire_sessions(db).await {
        Ok(n) if n > 0 => info!("Deleted {} expired sessions", n),
        Ok(_) => {}
        Err(e) => warn!("expire_sessions failed: {:#}", e),
    }
    match expire_blocklists(db).await {
        Ok(n) if n > 0 => info!("Deleted {} expired blocklist entries", n),
        Ok(_) => {}
        Err(e) => warn!("expire_blocklists failed: {:#}", e),
    }
    match expire_log_entries(db, settings.user_log_retention_days).await {
        Ok(n) if n > 0 => info!("Deleted {} old log entries", n),
        Ok(_) => {}
        Err(e) => warn!("expire_log_entries failed: {:#}", e),
    }
    match sync_last_activity(db, xmpp).await {
        Ok(n) if n > 0 => info!("Synced last activity for {} accounts", n),
        Ok(_) => {}
        Err(e) => warn!("sync_last_activity failed: {:#}", e),
    }
    match notify_expiring_accounts(db, mailer, settings).await {
        Ok(n) if n > 0 => info!("Warned {} expiring accounts", n),
        Ok(_) => {}
        Err(e) => warn!("notify_expiring_accounts failed: {:#}", e),
    }
    match remove_expired_accounts(db, xmpp, settings).await {
        Ok(n) if n > 0 => info!("Removed {} expired accounts", n),
        Ok(_) => {}
        Err(e) => warn!("remove_expired_accounts failed: {:#}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use roster_core::models::{
        confirmation::{Confirmation, Purpose},
        jid::Jid,
        log_entry::UserLogEntry,
        session::Session,
        user::User,
    };
    use roster_db::open_memory;
    use roster_web::mailer::RecordingMailer;
    use roster_xmpp::MemoryBackend;

    fn settings() -> SweepSettings {
        SweepSettings {
            base_url: "https://example.com".to_string(),
            account_expires_days: Some(365),
            account_expires_notification_days: 14,
            user_log_retention_days: 31,
        }
    }

    async fn store_user(db: &SqlitePool, jid: &str, idle_days: i64) -> Result<i64> {
        let jid = Jid::parse(jid).map_err(anyhow::Error::msg)?;
        let email = format!("{}@mail.example", jid.node());
        let mut user = User::new(jid, Some(email), "pw12345678")?;
        user.confirm();
        user.created_in_backend = true;
        user.last_activity = Utc::now() - Duration::days(idle_days);
        UserRepository::new(db.clone()).create(&user).await
    }

    #[tokio::test]
    async fn test_expire_confirmations_keeps_live_rows() -> Result<()> {
        let db = open_memory().await?;
        let user_id = store_user(&db, "alice@example.com", 0).await?;
        let repo = ConfirmationRepository::new(db.clone());

        let live = Confirmation::new(user_id, Purpose::Register, "a@mail.example", "192.0.2.1");
        repo.create(&live).await?;

        let mut expired =
            Confirmation::new(user_id, Purpose::Delete, "a@mail.example", "192.0.2.1");
        expired.expires_at = Utc::now() - Duration::hours(1);
        repo.create(&expired).await?;

        assert_eq!(expire_confirmations(&db).await?, 1);
        assert!(repo
            .find_valid(&live.key, Purpose::Register, Utc::now())
            .await?
            .is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_expire_sessions() -> Result<()> {
        let db = open_memory().await?;
        let user_id = store_user(&db, "alice@example.com", 0).await?;
        let repo = SessionRepository::new(db.clone());

        let live = Session::new(user_id, None);
        repo.create(&live).await?;

        let mut expired = Session::new(user_id, None);
        expired.expires_at = Utc::now() - Duration::hours(1);
        repo.create(&expired).await?;

        assert_eq!(expire_sessions(&db).await?, 1);
        assert!(repo.find_by_id(&live.id).await?.is_some());
        assert!(repo.find_by_id(&expired.id).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_expire_blocklists_spares_indefinite_blocks() -> Result<()> {
        let db = open_memory().await?;
        let emails = BlockedEmailRepository::new(db.clone());

        emails.block("forever@mail.example", None).await?;
        emails
            .block("brief@mail.example", Some(Utc::now() - Duration::hours(1)))
            .await?;

        assert_eq!(expire_blocklists(&db).await?, 1);
        assert!(emails.is_blocked("forever@mail.example", Utc::now()).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_expire_log_entries() -> Result<()> {
        let db = open_memory().await?;
        let user_id = store_user(&db, "alice@example.com", 0).await?;
        let repo = UserLogRepository::new(db.clone());

        let recent = UserLogEntry::new(user_id, "192.0.2.1", "Logged in");
        repo.create(&recent).await?;

        let mut stale = UserLogEntry::new(user_id, "192.0.2.1", "Logged in");
        stale.created_at = Utc::now() - Duration::days(60);
        repo.create(&stale).await?;

        assert_eq!(expire_log_entries(&db, 31).await?, 1);
        assert_eq!(repo.find_by_user(user_id, 50).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_sync_last_activity_pulls_newer_timestamps() -> Result<()> {
        let db = open_memory().await?;
        let user_id = store_user(&db, "alice@example.com", 30).await?;

        let backend = MemoryBackend::new();
        let jid = Jid::parse("alice@example.com").map_err(anyhow::Error::msg)?;
        backend.create_user(&jid, "pw").await?;
        let seen = Utc::now() - Duration::days(2);
        backend.set_last_activity(&jid, seen).await;

        assert_eq!(sync_last_activity(&db, &backend).await?, 1);

        let user = UserRepository::new(db.clone())
            .find_by_id(user_id)
            .await?
            .expect("user exists");
        assert!((user.last_activity - seen).num_seconds().abs() < 2);

        // Second run finds nothing newer.
        assert_eq!(sync_last_activity(&db, &backend).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_notify_expiring_accounts_warns_once() -> Result<()> {
        let db = open_memory().await?;
        store_user(&db, "idle@example.com", 360).await?;
        store_user(&db, "active@example.com", 10).await?;

        let mailer = RecordingMailer::default();
        assert_eq!(notify_expiring_accounts(&db, &mailer, &settings()).await?, 1);

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "idle@mail.example");
        assert!(sent[0].body.contains("idle@example.com"));
        drop(sent);

        // Already notified, so a second sweep stays quiet.
        assert_eq!(notify_expiring_accounts(&db, &mailer, &settings()).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_notify_respects_preference() -> Result<()> {
        let db = open_memory().await?;
        let jid = Jid::parse("quiet@example.com").map_err(anyhow::Error::msg)?;
        let mut user = User::new(jid, Some("quiet@mail.example".to_string()), "pw12345678")?;
        user.confirm();
        user.notify_account_expires = false;
        user.last_activity = Utc::now() - Duration::days(360);
        UserRepository::new(db.clone()).create(&user).await?;

        let mailer = RecordingMailer::default();
        assert_eq!(notify_expiring_accounts(&db, &mailer, &settings()).await?, 0);
        assert!(mailer.sent.lock().await.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_remove_expired_accounts() -> Result<()> {
        let db = open_memory().await?;
        let idle_id = store_user(&db, "gone@example.com", 400).await?;
        store_user(&db, "alive@example.com", 10).await?;

        let backend = MemoryBackend::new();
        let jid = Jid::parse("gone@example.com").map_err(anyhow::Error::msg)?;
        backend.create_user(&jid, "pw").await?;

        assert_eq!(remove_expired_accounts(&db, &backend, &settings()).await?, 1);
        assert!(!backend.user_exists(&jid).await?);
        assert!(UserRepository::new(db.clone())
            .find_by_id(idle_id)
            .await?
            .is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_expiry_disabled_when_unset() -> Result<()> {
        let db = open_memory().await?;
        store_user(&db, "gone@example.com", 4000).await?;

        let mut settings = settings();
        settings.account_expires_days = None;

        let backend = MemoryBackend::new();
        let mailer = RecordingMailer::default();

        assert_eq!(notify_expiring_accounts(&db, &mailer, &settings).await?, 0);
        assert_eq!(remove_expired_accounts(&db, &backend, &settings).await?, 0);

        Ok(())
    }
}
