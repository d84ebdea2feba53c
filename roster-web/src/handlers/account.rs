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

use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect},
    Form,
};
use chrono::Utc;
use roster_core::models::{confirmation::Purpose, gpg_key::GpgKey, user::User};
use roster_db::repositories::{ConfirmationRepository, GpgKeyRepository, UserLogRepository, UserRepository};
use serde::Deserialize;

use crate::{
    auth::CurrentUser,
    error::AppError,
    handlers::shared::{
        base_context, check_antispam, confirmed_metric, log_user, record_stat, render,
        render_message, request_metric, send_confirmation, ClientAddr,
    },
    state::AppState,
};

const LOG_DISPLAY_LIMIT: i64 = 50;

pub async fn detail(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Html<String>, AppError> {
    let user_id = require_id(&current.user)?;

    let gpg_keys = GpgKeyRepository::new(state.db.clone())
        .find_by_user(user_id)
        .await?;
    let log_entries = UserLogRepository::new(state.db.clone())
        .find_by_user(user_id, LOG_DISPLAY_LIMIT)
        .await?;

    let mut context = base_context(Some(&current));
    context.insert("email", &current.user.email);
    context.insert("confirmed", &current.user.has_confirmed_email());
    context.insert("notify_account_expires", &current.user.notify_account_expires);
    context.insert("gpg_keys", &gpg_keys);
    context.insert("log_entries", &log_entries);
    render(&state, "account.html", &context)
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordForm {
    pub current_password: String,
    pub new_password: String,
}

pub async fn set_password(
    State(state): State<AppState>,
    current: CurrentUser,
    ClientAddr(address): ClientAddr,
    Form(form): Form<ChangePasswordForm>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = require_id(&current.user)?;
    let mut user = current.user;

    if !user.verify_password(&form.current_password).unwrap_or(false) {
        return Err(AppError::forbidden("Current password is wrong"));
    }

    user.set_password(&form.new_password)?;
    state.xmpp.set_password(&user.jid, &form.new_password).await?;
    user.touch();
    UserRepository::new(state.db.clone()).update(&user).await?;

    record_stat(&state, roster_core::models::stat::STAT_SET_PASSWORD).await;
    log_user(&state, user_id, &address, "Password changed").await;

    Ok(Redirect::to("/account"))
}

#[derive(Debug, Deserialize)]
pub struct PreferencesForm {
    #[serde(default)]
    pub notify_account_expires: bool,
    #[serde(default)]
    pub notify_gpg_expires: bool,
}

pub async fn preferences(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<PreferencesForm>,
) -> Result<impl IntoResponse, AppError> {
    let mut user = current.user;
    user.notify_account_expires = form.notify_account_expires;
    user.notify_gpg_expires = form.notify_gpg_expires;
    UserRepository::new(state.db.clone()).update(&user).await?;

    Ok(Redirect::to("/account"))
}

#[derive(Debug, Deserialize)]
pub struct SetEmailForm {
    pub email: String,
    #[serde(default)]
    pub gpg_fingerprint: String,
}

/// Start an email change. The new address only becomes effective once the
/// link mailed to it is followed.
pub async fn set_email(
    State(state): State<AppState>,
    current: CurrentUser,
    ClientAddr(address): ClientAddr,
    Form(form): Form<SetEmailForm>,
) -> Result<Html<String>, AppError> {
    let user_id = require_id(&current.user)?;

    let email = form.email.trim().to_string();
    User::validate_email(&email).map_err(AppError::bad_request)?;
    check_antispam(&state, Some(&email), &address).await?;

    let gpg_fingerprint = form.gpg_fingerprint.trim();
    let payload = if gpg_fingerprint.is_empty() {
        serde_json::json!({ "email": email })
    } else {
        let normalized = roster_core::models::gpg_key::normalize_fingerprint(gpg_fingerprint)
            .map_err(AppError::bad_request)?;
        serde_json::json!({ "email": email, "gpg_fingerprint": normalized })
    };

    send_confirmation(&state, &current.user, Purpose::SetEmail, &email, &address, payload).await?;

    record_stat(&state, request_metric(Purpose::SetEmail)).await;
    log_user(&state, user_id, &address, "Email change requested").await;

    render_message(
        &state,
        Some(&current),
        "Check your inbox",
        "We sent a confirmation link to the new address.",
    )
}

/// Apply an email change from its confirmation link. The address and the
/// optional GPG fingerprint come from the stored payload, never from the
/// request.
pub async fn confirm_email(
    State(state): State<AppState>,
    ClientAddr(address): ClientAddr,
    Path(key): Path<String>,
) -> Result<Html<String>, AppError> {
    let confirmation = ConfirmationRepository::new(state.db.clone())
        .find_valid(&key, Purpose::SetEmail, Utc::now())
        .await?
        .ok_or_else(|| AppError::not_found("This confirmation link is invalid or has expired"))?;

    let user_repo = UserRepository::new(state.db.clone());
    let mut user = user_repo
        .find_by_id(confirmation.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Unknown confirmation"))?;

    let email = confirmation.payload["email"]
        .as_str()
        .ok_or_else(|| AppError::internal_server_error("Confirmation payload without email"))?
        .to_string();

    user.email = Some(email);
    user.confirm();
    if let Some(fingerprint) = confirmation.payload["gpg_fingerprint"].as_str() {
        user.gpg_fingerprint = Some(fingerprint.to_string());
    }
    user.touch();
    user_repo.update(&user).await?;

    let confirmation_id = confirmation
        .id
        .ok_or_else(|| AppError::internal_server_error("Confirmation without id"))?;
    ConfirmationRepository::new(state.db.clone())
        .delete(confirmation_id)
        .await?;

    record_stat(&state, confirmed_metric(Purpose::SetEmail)).await;
    log_user(&state, confirmation.user_id, &address, "Email address changed").await;

    render_message(
        &state,
        None,
        "Email address confirmed",
        "Your new address is now active.",
    )
}

#[derive(Debug, Deserialize)]
pub struct GpgKeyForm {
    pub fingerprint: String,
    #[serde(default)]
    pub key: String,
}

pub async fn upload_gpg_key(
    State(state): State<AppState>,
    current: CurrentUser,
    ClientAddr(address): ClientAddr,
    Form(form): Form<GpgKeyForm>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = require_id(&current.user)?;

    let key = GpgKey::new(user_id, &form.fingerprint, form.key.trim())
        .map_err(AppError::bad_request)?;
    GpgKeyRepository::new(state.db.clone()).upsert(&key).await?;

    let mut user = current.user;
    user.gpg_fingerprint = Some(key.fingerprint.clone());
    UserRepository::new(state.db.clone()).update(&user).await?;

    log_user(&state, user_id, &address, "GPG key uploaded").await;

    Ok(Redirect::to("/account"))
}

fn require_id(user: &User) -> Result<i64, AppError> {
    user.id
        .ok_or_else(|| AppError::internal_server_error("User without id"))
}
