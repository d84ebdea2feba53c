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
    response::{Html, IntoResponse},
    Form,
};
use axum_extra::extract::{cookie::Cookie, CookieJar};
use chrono::Utc;
use roster_core::models::confirmation::Purpose;
use roster_db::repositories::{ConfirmationRepository, UserRepository};
use serde::Deserialize;

use crate::{
    auth::{CurrentUser, SESSION_COOKIE},
    error::AppError,
    handlers::shared::{
        base_context, confirmed_metric, log_user, record_stat, render, render_message,
        request_metric, send_confirmation, ClientAddr,
    },
    state::AppState,
};

/// Start account deletion: mail a confirmation link to the user's address.
/// Accounts without a confirmed email cannot use the two-step flow and must
/// contact support.
pub async fn request(
    State(state): State<AppState>,
    current: CurrentUser,
    ClientAddr(address): ClientAddr,
) -> Result<Html<String>, AppError> {
    let user_id = current
        .user
        .id
        .ok_or_else(|| AppError::internal_server_error("User without id"))?;

    if !current.user.has_confirmed_email() {
        return Err(AppError::bad_request(
            "Account deletion requires a confirmed email address",
        ));
    }
    let email = current
        .user
        .email
        .clone()
        .ok_or_else(|| AppError::internal_server_error("Confirmed user without email"))?;

    send_confirmation(
        &state,
        &current.user,
        Purpose::Delete,
        &email,
        &address,
        serde_json::Value::Null,
    )
    .await?;

    record_stat(&state, request_metric(Purpose::Delete)).await;
    log_user(&state, user_id, &address, "Account deletion requested").await;

    render_message(
        &state,
        Some(&current),
        "Check your inbox",
        "Follow the link we sent to permanently delete your account.",
    )
}

pub async fn confirm_form(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Html<String>, AppError> {
    let confirmation = find_confirmation(&state, &key).await?;

    let user = UserRepository::new(state.db.clone())
        .find_by_id(confirmation.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Unknown confirmation"))?;

    let mut context = base_context(None);
    context.insert("jid", &user.jid.to_string());
    render(&state, "delete_confirm.html", &context)
}

#[derive(Debug, Deserialize)]
pub struct DeleteConfirmForm {
    pub password: String,
}

/// Final step: the password gates the irreversible removal, so a leaked
/// mailbox alone cannot destroy the account.
pub async fn confirm(
    State(state): State<AppState>,
    Path(key): Path<String>,
    jar: CookieJar,
    Form(form): Form<DeleteConfirmForm>,
) -> Result<impl IntoResponse, AppError> {
    let confirmation = find_confirmation(&state, &key).await?;

    let user_repo = UserRepository::new(state.db.clone());
    let user = user_repo
        .find_by_id(confirmation.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Unknown confirmation"))?;

    if !user.verify_password(&form.password).unwrap_or(false) {
        return Err(AppError::forbidden("Wrong password"));
    }

    state.xmpp.remove_user(&user.jid).await?;

    let user_id = confirmation.user_id;
    tracing::info!(jid = %user.jid, "Deleting account");
    // Sessions, confirmations, keys and log entries go with the row.
    user_repo.delete(user_id).await?;

    record_stat(&state, confirmed_metric(Purpose::Delete)).await;

    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
    let page = render_message(
        &state,
        None,
        "Account deleted",
        "Your account and its data have been removed.",
    )?;

    Ok((jar, page))
}

async fn find_confirmation(
    state: &AppState,
    key: &str,
) -> Result<roster_core::models::confirmation::Confirmation, AppError> {
    ConfirmationRepository::new(state.db.clone())
        .find_valid(key, Purpose::Delete, Utc::now())
        .await?
        .ok_or_else(|| AppError::not_found("This confirmation link is invalid or has expired"))
}

#[cfg(test)]
mod tests {
    use crate::test_helpers::{
        create_confirmed_user, create_test_state, last_confirmation_key, login, test_server,
    };
    use anyhow::Result;
    use roster_core::models::jid::Jid;
    use roster_db::repositories::UserRepository;

    #[tokio::test]
    async fn test_delete_flow_removes_account() -> Result<()> {
        let state = create_test_state().await?;
        create_confirmed_user(&state, "alice@example.com", "pw12345678").await?;
        let jid = Jid::parse("alice@example.com").map_err(anyhow::Error::msg)?;

        let server = test_server(state.clone())?;
        login(&server, "alice@example.com", "pw12345678").await;

        server.post("/account/delete").await.assert_status_ok();
        let key = last_confirmation_key(&state).await?;

        // Wrong password keeps the account.
        server
            .post(&format!("/account/delete/confirm/{}", key))
            .form(&[("password", "wrong")])
            .await
            .assert_status_forbidden();

        server
            .post(&format!("/account/delete/confirm/{}", key))
            .form(&[("password", "pw12345678")])
            .await
            .assert_status_ok();

        assert!(UserRepository::new(state.db.clone())
            .find_by_jid(&jid)
            .await?
            .is_none());
        assert!(!state.xmpp.user_exists(&jid).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_requires_confirmed_email() -> Result<()> {
        let state = create_test_state().await?;
        crate::test_helpers::create_test_user(&state, "bob@example.com", "pw12345678").await?;
        let server = test_server(state)?;
        login(&server, "bob@example.com", "pw12345678").await;

        server.post("/account/delete").await.assert_status_bad_request();

        Ok(())
    }
}
