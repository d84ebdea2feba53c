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
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub templates_dir: String,
    /// Base URL used in emailed confirmation links, e.g. `https://example.com`.
    pub canonical_base_url: String,
    /// Domains users may register accounts under. The first entry is the
    /// default shown in forms.
    pub xmpp_hosts: Vec<String>,
    /// Admin API of the XMPP server. When unset, an in-process backend is
    /// used (development only).
    pub xmpp_api_url: Option<String>,
    pub xmpp_api_token: String,
    /// Email address the contact form delivers to.
    pub contact_email: String,
    /// Accounts idle longer than this are removed. `None` disables the
    /// whole expiry mechanism.
    pub account_expires_days: Option<i64>,
    /// Days before removal at which the warning mail goes out.
    pub account_expires_notification_days: i64,
    /// How long an email address stays blocked after abuse, in hours.
    pub blocked_email_timeout_hours: i64,
    pub blocked_ip_timeout_hours: i64,
    /// DNS blocklist zones consulted before accepting registrations and
    /// contact form submissions.
    pub dnsbl_zones: Vec<String>,
    pub user_log_retention_days: i64,
    pub login_rate_limit_per_minute: u32,
    pub register_rate_limit_per_minute: u32,
    pub contact_rate_limit_per_minute: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let xmpp_hosts: Vec<String> = env::var("XMPP_HOSTS")
            .unwrap_or_else(|_| "example.com".to_string())
            .split(',')
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();

        if xmpp_hosts.is_empty() {
            anyhow::bail!("XMPP_HOSTS must name at least one domain");
        }

        let dnsbl_zones = env::var("DNSBL_ZONES")
            .unwrap_or_default()
            .split(',')
            .map(|z| z.trim().to_string())
            .filter(|z| !z.is_empty())
            .collect();

        Ok(Self {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:roster.db".into()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("Invalid PORT")?,
            templates_dir: env::var("TEMPLATES_DIR").unwrap_or_else(|_| "templates".to_string()),
            canonical_base_url: env::var("CANONICAL_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            xmpp_hosts,
            xmpp_api_url: env::var("XMPP_API_URL").ok().filter(|v| !v.is_empty()),
            xmpp_api_token: env::var("XMPP_API_TOKEN").unwrap_or_default(),
            contact_email: env::var("CONTACT_EMAIL")
                .unwrap_or_else(|_| "contact@localhost".to_string()),
            account_expires_days: parse_optional_days("ACCOUNT_EXPIRES_DAYS")?,
            account_expires_notification_days: env::var("ACCOUNT_EXPIRES_NOTIFICATION_DAYS")
                .unwrap_or_else(|_| "14".to_string())
                .parse()
                .context("Invalid ACCOUNT_EXPIRES_NOTIFICATION_DAYS")?,
            blocked_email_timeout_hours: env::var("BLOCKED_EMAIL_TIMEOUT_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .context("Invalid BLOCKED_EMAIL_TIMEOUT_HOURS")?,
            blocked_ip_timeout_hours: env::var("BLOCKED_IP_TIMEOUT_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .context("Invalid BLOCKED_IP_TIMEOUT_HOURS")?,
            dnsbl_zones,
            user_log_retention_days: env::var("USER_LOG_RETENTION_DAYS")
                .unwrap_or_else(|_| "31".to_string())
                .parse()
                .context("Invalid USER_LOG_RETENTION_DAYS")?,
            login_rate_limit_per_minute: parse_limit("LOGIN_RATE_LIMIT", 5)?,
            register_rate_limit_per_minute: parse_limit("REGISTER_RATE_LIMIT", 3)?,
            contact_rate_limit_per_minute: parse_limit("CONTACT_RATE_LIMIT", 3)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn default_host(&self) -> &str {
        &self.xmpp_hosts[0]
    }

    pub fn is_managed_host(&self, domain: &str) -> bool {
        self.xmpp_hosts.iter().any(|h| h == domain)
    }

    /// Absolute URL for a site-relative path.
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{}", self.canonical_base_url, path)
    }

    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            templates_dir: "templates".to_string(),
            canonical_base_url: "https://example.com".to_string(),
            xmpp_hosts: vec!["example.com".to_string(), "example.net".to_string()],
            xmpp_api_url: None,
            xmpp_api_token: String::new(),
            contact_email: "contact@example.com".to_string(),
            account_expires_days: Some(365),
            account_expires_notification_days: 14,
            blocked_email_timeout_hours: 24,
            blocked_ip_timeout_hours: 24,
            dnsbl_zones: Vec::new(),
            user_log_retention_days: 31,
            login_rate_limit_per_minute: 100,
            register_rate_limit_per_minute: 100,
            contact_rate_limit_per_minute: 100,
        }
    }
}

fn parse_optional_days(var: &str) -> Result<Option<i64>> {
    match env::var(var) {
        Ok(value) if !value.is_empty() => {
            let days = value
                .parse()
                .with_context(|| format!("Invalid {}", var))?;
            Ok(Some(days))
        }
        _ => Ok(None),
    }
}

fn parse_limit(var: &str, default: u32) -> Result<u32> {
    match env::var(var) {
        Ok(value) => value.parse().with_context(|| format!("Invalid {}", var)),
        Err(_) => Ok(default),
    }
}
