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
    dnsbl::DnsblChecker,
    mailer::{Mailer, TracingMailer},
    rate_limit::create_rate_limiter,
    routes,
    state::AppState,
    templates::init_templates,
};
use roster_xmpp::{HttpBackend, MemoryBackend, XmppBackend};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roster_web=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Starting Roster web server");

    // Initialize database
    info!("Initializing database: {}", config.database_url);
    let db = roster_db::init_database(&config.database_url).await?;

    // Initialize templates
    info!("Loading templates from: {}", config.templates_dir);
    let templates = init_templates(&config.templates_dir)?;

    // XMPP server backend
    let xmpp: Arc<dyn XmppBackend> = match &config.xmpp_api_url {
        Some(api_url) => {
            info!("Using XMPP admin API at {}", api_url);
            Arc::new(HttpBackend::new(
                Url::parse(api_url)?,
                &config.xmpp_api_token,
            )?)
        }
        None => {
            warn!("XMPP_API_URL not set, using in-process backend (development only)");
            Arc::new(MemoryBackend::default())
        }
    };

    let mailer: Arc<dyn Mailer> = Arc::new(TracingMailer);
    let dnsbl = Arc::new(DnsblChecker::new(config.dnsbl_zones.clone()));

    // Create application state
    let state = AppState::new(
        db,
        templates,
        config.clone(),
        xmpp,
        mailer,
        dnsbl,
        create_rate_limiter(config.login_rate_limit_per_minute),
        create_rate_limiter(config.register_rate_limit_per_minute),
        create_rate_limiter(config.contact_rate_limit_per_minute),
    );

    // Create router
    let app = routes::create_router(state);

    // Start server
    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
