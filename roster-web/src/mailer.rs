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
use async_trait::async_trait;
use tokio::sync::Mutex;

/// An email waiting to leave the system. When `gpg_fingerprint` is set the
/// transport encrypts the body to that key before delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub gpg_fingerprint: Option<String>,
}

/// Outbound mail transport. Handlers only build messages; delivery and GPG
/// encryption are the transport's concern.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<()>;
}

/// Logs outgoing mail instead of delivering it. Used in development and as
/// a safe default when no transport is configured.
#[derive(Debug, Default)]
pub struct TracingMailer;

#[async_trait]
impl Mailer for TracingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        tracing::info!(
            to = %mail.to,
            subject = %mail.subject,
            encrypted = mail.gpg_fingerprint.is_some(),
            body = %mail.body,
            "Outgoing mail (not delivered: no transport configured)"
        );
        Ok(())
    }
}

/// Captures sent mail for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingMail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        self.sent.lock().await.push(mail);
        Ok(())
    }
}
