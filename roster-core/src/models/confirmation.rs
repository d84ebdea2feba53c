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

use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

pub const CONFIRMATION_KEY_LEN: usize = 64;
const CONFIRMATION_TTL_HOURS: i64 = 24;

/// The one-time action a confirmation link authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Purpose {
    Register,
    ResetPassword,
    SetEmail,
    Delete,
}

impl Purpose {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Register => 0,
            Self::ResetPassword => 1,
            Self::SetEmail => 2,
            Self::Delete => 3,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Register),
            1 => Some(Self::ResetPassword),
            2 => Some(Self::SetEmail),
            3 => Some(Self::Delete),
            _ => None,
        }
    }

    /// URL path segment the emailed link points at.
    pub fn path(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::ResetPassword => "reset-password",
            Self::SetEmail => "set-email",
            Self::Delete => "delete",
        }
    }

    pub fn subject(self) -> &'static str {
        match self {
            Self::Register => "Confirm your account",
            Self::ResetPassword => "Reset your password",
            Self::SetEmail => "Confirm your new email address",
            Self::Delete => "Confirm account deletion",
        }
    }
}

/// A randomly keyed record backing an emailed confirmation link. Redeeming
/// deletes the row, so every key works at most once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Confirmation {
    pub id: Option<i64>,
    pub key: String,
    pub user_id: i64,
    pub purpose: Purpose,
    /// Address the link was mailed to. For email changes this is the *new*
    /// address, which is also carried in the payload.
    pub to: String,
    pub payload: serde_json::Value,
    /// Client address that requested the confirmation.
    pub address: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Confirmation {
    pub fn new(user_id: i64, purpose: Purpose, to: &str, address: &str) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            key: generate_key(),
            user_id,
            purpose,
            to: to.to_string(),
            payload: serde_json::Value::Null,
            address: address.to_string(),
            expires_at: now + Duration::hours(CONFIRMATION_TTL_HOURS),
            created_at: now,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Path of the link sent to the user, relative to the canonical base URL.
    pub fn link_path(&self) -> String {
        format!("/account/{}/confirm/{}", self.purpose.path(), self.key)
    }
}

fn generate_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CONFIRMATION_KEY_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_confirmation() {
        let conf = Confirmation::new(3, Purpose::Register, "user@mail.example", "192.0.2.9");

        assert_eq!(conf.key.len(), CONFIRMATION_KEY_LEN);
        assert!(conf.key.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(conf.user_id, 3);
        assert_eq!(conf.purpose, Purpose::Register);
        assert_eq!(conf.payload, serde_json::Value::Null);
        assert!(!conf.is_expired());

        let ttl = conf.expires_at - conf.created_at;
        assert_eq!(ttl.num_hours(), CONFIRMATION_TTL_HOURS);
    }

    #[test]
    fn test_keys_are_unique() {
        let a = Confirmation::new(1, Purpose::Delete, "a@mail.example", "192.0.2.1");
        let b = Confirmation::new(1, Purpose::Delete, "a@mail.example", "192.0.2.1");
        assert_ne!(a.key, b.key);
    }

    #[test]
    fn test_with_payload() {
        let conf = Confirmation::new(1, Purpose::SetEmail, "new@mail.example", "192.0.2.1")
            .with_payload(serde_json::json!({ "email": "new@mail.example" }));
        assert_eq!(conf.payload["email"], "new@mail.example");
    }

    #[test]
    fn test_expired() {
        let mut conf = Confirmation::new(1, Purpose::ResetPassword, "a@mail.example", "192.0.2.1");
        conf.expires_at = Utc::now() - Duration::seconds(1);
        assert!(conf.is_expired());
    }

    #[test]
    fn test_link_path() {
        let conf = Confirmation::new(1, Purpose::ResetPassword, "a@mail.example", "192.0.2.1");
        assert_eq!(
            conf.link_path(),
            format!("/account/reset-password/confirm/{}", conf.key)
        );
    }

    #[test]
    fn test_purpose_roundtrip() {
        for purpose in [
            Purpose::Register,
            Purpose::ResetPassword,
            Purpose::SetEmail,
            Purpose::Delete,
        ] {
            assert_eq!(Purpose::from_i64(purpose.as_i64()), Some(purpose));
        }
        assert_eq!(Purpose::from_i64(99), None);
    }
}
