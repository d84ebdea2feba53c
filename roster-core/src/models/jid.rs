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

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// Conservative subset of what nodeprep allows. Quotes, slashes and the
// XMPP-reserved characters (@, /) are rejected outright.
static NODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]*$").expect("Failed to compile node regex"));

static DOMAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9-]*(\.[a-z0-9][a-z0-9-]*)+$")
        .expect("Failed to compile domain regex")
});

/// A bare JID (`node@domain`). Always stored lowercased, since XMPP
/// addresses are case insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jid {
    node: String,
    domain: String,
}

impl Jid {
    pub fn new(node: &str, domain: &str) -> Result<Self, String> {
        let node = node.trim().to_lowercase();
        let domain = domain.trim().to_lowercase();

        Self::validate_node(&node)?;
        Self::validate_domain(&domain)?;

        // MySQL-era limit kept for compatibility with imported data
        if node.len() + domain.len() + 1 > 255 {
            return Err("JID cannot exceed 255 characters".to_string());
        }

        Ok(Self { node, domain })
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        let (node, domain) = value
            .trim()
            .split_once('@')
            .ok_or_else(|| "JID must contain an @".to_string())?;

        Self::new(node, domain)
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn validate_node(node: &str) -> Result<(), String> {
        if node.is_empty() {
            return Err("Username cannot be empty".to_string());
        }

        if !NODE_RE.is_match(node) {
            return Err(
                "Username may only contain letters, numbers, dots, underscores and hyphens"
                    .to_string(),
            );
        }

        Ok(())
    }

    pub fn validate_domain(domain: &str) -> Result<(), String> {
        if domain.is_empty() {
            return Err("Domain cannot be empty".to_string());
        }

        if !DOMAIN_RE.is_match(domain) {
            return Err("Invalid domain".to_string());
        }

        Ok(())
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.node, self.domain)
    }
}

impl TryFrom<String> for Jid {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Jid> for String {
    fn from(jid: Jid) -> Self {
        jid.to_string()
    }
}
