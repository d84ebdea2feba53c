use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roster_core::models::jid::Jid;

/// Account operations on the XMPP server. The server is authoritative for
/// passwords and last-seen times; the local database mirrors the rest.
#[async_trait]
pub trait XmppBackend: Send + Sync {
    /// Create a usable account with a password.
    async fn create_user(&self, jid: &Jid, password: &str) -> Result<()>;

    /// Reserve a username before its email is confirmed. Reserved accounts
    /// exist but cannot log in until a password is set.
    async fn create_reservation(&self, jid: &Jid) -> Result<()>;

    async fn set_password(&self, jid: &Jid, password: &str) -> Result<()>;

    async fn user_exists(&self, jid: &Jid) -> Result<bool>;

    async fn remove_user(&self, jid: &Jid) -> Result<()>;

    /// All usernames registered for a domain, as full JIDs.
    async fn all_users(&self, domain: &str) -> Result<Vec<Jid>>;

    /// When the account was last seen online. `None` if the server has no
    /// record, e.g. for an account that never logged in.
    async fn last_activity(&self, jid: &Jid) -> Result<Option<DateTime<Utc>>>;
}
