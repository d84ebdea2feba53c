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
use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
    response::Html,
};
use chrono::Utc;
use roster_core::models::{
    confirmation::{Confirmation, Purpose},
    log_entry::UserLogEntry,
    stat::StatEvent,
    user::User,
};
use roster_db::repositories::{
    BlockedEmailRepository, BlockedIpRepository, ConfirmationRepository, GpgKeyRepository,
    StatRepository, UserLogRepository,
};
use std::{convert::Infallible, net::SocketAddr};
use tera::Context;

use crate::{
    auth::CurrentUser,
    dnsbl::DnsblResult,
    error::AppError,
    mailer::OutgoingMail,
    state::AppState,
};

/// Client address as text. Falls back to loopback when the server runs
/// without connect info, e.g. under the test harness.
#[derive(Debug, Clone)]
pub struct ClientAddr(pub String);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip().to_string())
            .unwrap_or_else(|| "127.0.0.1".to_string());
        Ok(ClientAddr(addr))
    }
}

/// Base template context shared by every page.
pub fn base_context(user: Option<&CurrentUser>) -> Context {
    let mut context = Context::new();
    context.insert("site_title", "Roster");
    if let Some(current) = user {
        context.insert("current_user", &current.user.jid.to_string());
    }
    context
}

pub fn render(state: &AppState, template: &str, context: &Context) -> Result<Html<String>, AppError> {
    let html = state.templates.render(template, context).map_err(|e| {
        AppError::internal_server_error("Failed to render page")
            .with_details(format!("{}: {:?}", template, e))
    })?;
    Ok(Html(html))
}

/// Render the generic notice page.
pub fn render_message(
    state: &AppState,
    user: Option<&CurrentUser>,
    heading: &str,
    text: &str,
) -> Result<Html<String>, AppError> {
    let mut context = base_context(user);
    context.insert("heading", heading);
    context.insert("text", text);
    render(state, "message.html", &context)
}

pub async fn record_stat(state: &AppState, metric: &str) {
    let repo = StatRepository::new(state.db.clone());
    if let Err(e) = repo.record(&StatEvent::new(metric, 1)).await {
        tracing::warn!(metric = metric, error = ?e, "Failed to record stat event");
    }
}

pub async fn log_user(state: &AppState, user_id: i64, address: &str, message: &str) {
    let repo = UserLogRepository::new(state.db.clone());
    if let Err(e) = repo
        .create(&UserLogEntry::new(user_id, address, message))
        .await
    {
        tracing::warn!(user_id = user_id, error = ?e, "Failed to write user log entry");
    }
}

/// Create a confirmation, store it, and mail its link. When the user has a
/// valid GPG key on file the fingerprint rides along so the transport can
/// encrypt the message.
pub async fn send_confirmation(
    state: &AppState,
    user: &User,
    purpose: Purpose,
    to: &str,
    address: &str,
    payload: serde_json::Value,
) -> Result<(), AppError> {
    let user_id = user
        .id
        .ok_or_else(|| AppError::internal_server_error("User without id"))?;

    let confirmation = Confirmation::new(user_id, purpose, to, address).with_payload(payload);
    ConfirmationRepository::new(state.db.clone())
        .create(&confirmation)
        .await?;

    let gpg_fingerprint = GpgKeyRepository::new(state.db.clone())
        .find_valid_by_user(user_id, Utc::now())
        .await?
        .first()
        .map(|key| key.fingerprint.clone());

    let link = state.config.absolute_url(&confirmation.link_path());
    let body = format!(
        "Hi {},\n\nplease confirm by visiting this link:\n\n    {}\n\n\
         The link is valid for 24 hours. If you did not request this,\n\
         you can ignore this message.\n",
        user.jid, link
    );

    state
        .mailer
        .send(OutgoingMail {
            to: to.to_string(),
            subject: purpose.subject().to_string(),
            body,
            gpg_fingerprint,
        })
        .await
        .map_err(AppError::from)?;

    Ok(())
}

/// Reject submissions from blocked addresses. Email is normalized before
/// matching; the client IP is checked against the local blocklist and the
/// configured DNS blocklists.
pub async fn check_antispam(
    state: &AppState,
    email: Option<&str>,
    address: &str,
) -> Result<(), AppError> {
    let now = Utc::now();

    if let Some(email) = email {
        let blocked = BlockedEmailRepository::new(state.db.clone())
            .is_blocked(email, now)
            .await?;
        if blocked {
            return Err(AppError::forbidden("This email address is blocked"));
        }
    }

    let blocked = BlockedIpRepository::new(state.db.clone())
        .is_blocked(address, now)
        .await?;
    if blocked {
        return Err(AppError::forbidden("Your address is blocked"));
    }

    if state.dnsbl.is_enabled() {
        if let Ok(ip) = address.parse() {
            if let DnsblResult::Listed { zone, reason } = state.dnsbl.check(ip).await {
                tracing::info!(address = address, zone = %zone, reason = ?reason, "Rejected DNSBL-listed client");
                return Err(AppError::forbidden("Your address is listed on a blocklist"));
            }
        }
    }

    Ok(())
}

/// Metric recorded when a confirmation of this purpose is requested.
pub fn request_metric(purpose: Purpose) -> &'static str {
    use roster_core::models::stat::*;
    match purpose {
        Purpose::Register => STAT_REGISTER,
        Purpose::ResetPassword => STAT_RESET_PASSWORD,
        Purpose::SetEmail => STAT_SET_EMAIL,
        Purpose::Delete => STAT_DELETE_ACCOUNT,
    }
}

/// Metric recorded when a confirmation of this purpose is redeemed.
pub fn confirmed_metric(purpose: Purpose) -> &'static str {
    use roster_core::models::stat::*;
    match purpose {
        Purpose::Register => STAT_REGISTER_CONFIRMED,
        Purpose::ResetPassword => STAT_RESET_PASSWORD_CONFIRMED,
        Purpose::SetEmail => STAT_SET_EMAIL_CONFIRMED,
        Purpose::Delete => STAT_DELETE_ACCOUNT_CONFIRMED,
    }
}
