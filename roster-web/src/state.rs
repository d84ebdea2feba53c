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

use axum::extract::FromRef;
use roster_xmpp::XmppBackend;
use sqlx::SqlitePool;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tera::Tera;
use tokio::sync::RwLock;

use crate::{config::Config, dnsbl::DnsblChecker, mailer::Mailer, rate_limit::SharedRateLimiter};

const AVAILABILITY_CACHE_TTL: Duration = Duration::from_secs(30);

/// Short-lived cache for username availability answers, so in-band and
/// website checks for the same name do not each hit the XMPP server.
#[derive(Default)]
pub struct AvailabilityCache {
    entries: RwLock<HashMap<String, (bool, Instant)>>,
}

impl AvailabilityCache {
    pub async fn get(&self, jid: &str) -> Option<bool> {
        let entries = self.entries.read().await;
        let (available, expires_at) = entries.get(jid)?;
        if *expires_at > Instant::now() {
            Some(*available)
        } else {
            None
        }
    }

    pub async fn put(&self, jid: &str, available: bool) {
        self.put_with_ttl(jid, available, AVAILABILITY_CACHE_TTL).await
    }

    /// Expired entries are dropped on every insert; the checks come from
    /// unauthenticated clients, so the map must not grow unbounded.
    async fn put_with_ttl(&self, jid: &str, available: bool, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(jid.to_string(), (available, now + ttl));
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub templates: Arc<Tera>,
    pub config: Config,
    pub xmpp: Arc<dyn XmppBackend>,
    pub mailer: Arc<dyn Mailer>,
    pub dnsbl: Arc<DnsblChecker>,
    pub login_rate_limiter: SharedRateLimiter,
    pub register_rate_limiter: SharedRateLimiter,
    pub contact_rate_limiter: SharedRateLimiter,
    pub availability_cache: Arc<AvailabilityCache>,
    /// Test-only handle on the recording mailer backing `mailer`.
    #[cfg(test)]
    pub recording_mailer: Arc<crate::mailer::RecordingMailer>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: SqlitePool,
        templates: Arc<Tera>,
        config: Config,
        xmpp: Arc<dyn XmppBackend>,
        mailer: Arc<dyn Mailer>,
        dnsbl: Arc<DnsblChecker>,
        login_rate_limiter: SharedRateLimiter,
        register_rate_limiter: SharedRateLimiter,
        contact_rate_limiter: SharedRateLimiter,
    ) -> Self {
        Self {
            db,
            templates,
            config,
            xmpp,
            mailer,
            dnsbl,
            login_rate_limiter,
            register_rate_limiter,
            contact_rate_limiter,
            availability_cache: Arc::new(AvailabilityCache::default()),
            #[cfg(test)]
            recording_mailer: Arc::new(crate::mailer::RecordingMailer::default()),
        }
    }

    #[cfg(test)]
    pub fn test_mailer(&self) -> &crate::mailer::RecordingMailer {
        &self.recording_mailer
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
