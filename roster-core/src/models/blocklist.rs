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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Domains where `f.o.o@...` delivers to the same mailbox as `foo@...`.
const GMAIL_DOMAINS: &[&str] = &["google.com", "googlemail.com", "gmail.com"];

/// Normalize an email address for blocklist matching: lowercase, drop any
/// `+tag`, and collapse dot-aliases on Gmail domains.
pub fn normalize_email(value: &str) -> String {
    let value = value.trim().to_lowercase();

    let (local, domain) = match value.rsplit_once('@') {
        Some((local, domain)) => (local, domain),
        None => return value,
    };

    let mut local = local.split('+').next().unwrap_or(local).to_string();
    if GMAIL_DOMAINS.contains(&domain) {
        local = local.replace('.', "");
    }

    format!("{}@{}", local, domain)
}

/// An email address that may not register or request confirmations.
/// `expires_at == None` blocks indefinitely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockedEmail {
    pub id: Option<i64>,
    pub address: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl BlockedEmail {
    pub fn new(address: &str, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: None,
            address: normalize_email(address),
            expires_at,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        blocklist_active(self.expires_at, now)
    }
}

/// A blocked client IP address, stored in textual form (v4 or v6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockedIp {
    pub id: Option<i64>,
    pub address: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl BlockedIp {
    pub fn new(address: &str, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: None,
            address: address.trim().to_string(),
            expires_at,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        blocklist_active(self.expires_at, now)
    }
}

fn blocklist_active(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match expires_at {
        Some(expires) => expires > now,
        None => true,
    }
}

/// Merge rule when re-blocking an already blocked address: an existing block
/// may only grow. Indefinite (`None`) wins over any deadline.
pub fn merge_expiry(
    current: Option<DateTime<Utc>>,
    requested: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (current, requested) {
        (None, _) | (_, None) => None,
        (Some(a), Some(b)) => Some(a.max(b)),
    }
}
