use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roster_core::models::jid::Jid;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::backend::XmppBackend;

#[derive(Debug, Clone)]
struct Account {
    password: Option<String>,
    last_activity: Option<DateTime<Utc>>,
}

/// In-process backend for tests and local development. Holds accounts in a
/// map and mimics the semantics of the HTTP backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    accounts: RwLock<HashMap<String, Account>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: pretend the account was last seen at `at`.
    pub async fn set_last_activity(&self, jid: &Jid, at: DateTime<Utc>) {
        let mut accounts = self.accounts.write().await;
        if let Some(account) = accounts.get_mut(&jid.to_string()) {
            account.last_activity = Some(at);
        }
    }

    pub async fn password_of(&self, jid: &Jid) -> Option<String> {
        let accounts = self.accounts.read().await;
        accounts.get(&jid.to_string()).and_then(|a| a.password.clone())
    }
}

#[async_trait]
impl XmppBackend for MemoryBackend {
    async fn create_user(&self, jid: &Jid, password: &str) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&jid.to_string()) {
            anyhow::bail!("Account already exists: {}", jid);
        }
        accounts.insert(
            jid.to_string(),
            Account {
                password: Some(password.to_string()),
                last_activity: None,
            },
        );
        Ok(())
    }

    async fn create_reservation(&self, jid: &Jid) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&jid.to_string()) {
            anyhow::bail!("Account already exists: {}", jid);
        }
        accounts.insert(
            jid.to_string(),
            Account {
                password: None,
                last_activity: None,
            },
        );
        Ok(())
    }

    async fn set_password(&self, jid: &Jid, password: &str) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&jid.to_string())
            .ok_or_else(|| anyhow::anyhow!("No such account: {}", jid))?;
        account.password = Some(password.to_string());
        Ok(())
    }

    async fn user_exists(&self, jid: &Jid) -> Result<bool> {
        let accounts = self.accounts.read().await;
        Ok(accounts.contains_key(&jid.to_string()))
    }

    async fn remove_user(&self, jid: &Jid) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        accounts.remove(&jid.to_string());
        Ok(())
    }

    async fn all_users(&self, domain: &str) -> Result<Vec<Jid>> {
        let accounts = self.accounts.read().await;
        let mut jids = Vec::new();
        for key in accounts.keys() {
            let jid = Jid::parse(key).map_err(anyhow::Error::msg)?;
            if jid.domain() == domain {
                jids.push(jid);
            }
        }
        jids.sort_by(|a, b| a.node().cmp(&b.node()));
        Ok(jids)
    }

    async fn last_activity(&self, jid: &Jid) -> Result<Option<DateTime<Utc>>> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .get(&jid.to_string())
            .and_then(|a| a.last_activity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn jid(s: &str) -> Jid {
        Jid::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_exists() -> Result<()> {
        let backend = MemoryBackend::new();
        let alice = jid("alice@example.com");

        assert!(!backend.user_exists(&alice).await?);
        backend.create_user(&alice, "hunter2").await?;
        assert!(backend.user_exists(&alice).await?);
        assert!(backend.create_user(&alice, "other").await.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_reservation_has_no_password() -> Result<()> {
        let backend = MemoryBackend::new();
        let alice = jid("alice@example.com");

        backend.create_reservation(&alice).await?;
        assert!(backend.user_exists(&alice).await?);
        assert_eq!(backend.password_of(&alice).await, None);

        backend.set_password(&alice, "hunter2").await?;
        assert_eq!(backend.password_of(&alice).await.as_deref(), Some("hunter2"));

        Ok(())
    }

    #[tokio::test]
    async fn test_remove_user() -> Result<()> {
        let backend = MemoryBackend::new();
        let alice = jid("alice@example.com");

        backend.create_user(&alice, "hunter2").await?;
        backend.remove_user(&alice).await?;
        assert!(!backend.user_exists(&alice).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_all_users_filters_by_domain() -> Result<()> {
        let backend = MemoryBackend::new();
        backend.create_user(&jid("bob@example.com"), "x").await?;
        backend.create_user(&jid("alice@example.com"), "x").await?;
        backend.create_user(&jid("carol@example.org"), "x").await?;

        let users = backend.all_users("example.com").await?;
        let names: Vec<String> = users.iter().map(|j| j.to_string()).collect();
        assert_eq!(names, vec!["alice@example.com", "bob@example.com"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_last_activity() -> Result<()> {
        let backend = MemoryBackend::new();
        let alice = jid("alice@example.com");

        backend.create_user(&alice, "x").await?;
        assert_eq!(backend.last_activity(&alice).await?, None);

        let seen = Utc::now();
        backend.set_last_activity(&alice, seen).await;
        assert_eq!(backend.last_activity(&alice).await?, Some(seen));

        Ok(())
    }
}
