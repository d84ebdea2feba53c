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
use roster_web::{
    config::Config,
    mailer::{Mailer, TracingMailer},
};
use roster_worker::{run_all, SweepSettings};
use roster_xmpp::{HttpBackend, MemoryBackend, XmppBackend};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

const DEFAULT_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roster_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!("Starting Roster housekeeping worker");

    let db = roster_db::init_database(&config.database_url).await?;

    let xmpp: Arc<dyn XmppBackend> = match &config.xmpp_api_url {
        Some(api_url) => Arc::new(HttpBackend::new(
            Url::parse(api_url)?,
            &config.xmpp_api_token,
        )?),
        None => {
            warn!("XMPP_API_URL not set, using in-process backend (development only)");
            Arc::new(MemoryBackend::default())
        }
    };
    let mailer: Arc<dyn Mailer> = Arc::new(TracingMailer);

    let settings = SweepSettings {
        base_url: config.canonical_base_url.clone(),
        account_expires_days: config.account_expires_days,
        account_expires_notification_days: config.account_expires_notification_days,
        user_log_retention_days: config.user_log_retention_days,
    };

    let interval_secs = std::env::var("WORKER_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_INTERVAL_SECS);
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;
        info!("Running housekeeping sweeps");
        run_all(&db, xmpp.as_ref(), mailer.as_ref(), &settings).await;
    }
}
