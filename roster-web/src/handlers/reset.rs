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
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use chrono::Utc;
use roster_core::models::{confirmation::Purpose, jid::Jid, session::Session};
use roster_db::repositories::{ConfirmationRepository, SessionRepository, UserRepository};
use serde::Deserialize;

use crate::{
    auth::SESSION_COOKIE,
    error::AppError,
    handlers::shared::{
        base_context, confirmed_metric, log_user, record_stat, render, render_message,
        request_metric, send_confirmation, ClientAddr,
    },
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ResetRequestForm {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordForm {
    pub password: String,
}

pub async fn form(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    render(&state, "reset_password.html", &base_context(None))
}

pub async fn request(
    State(state): State<AppState>,
    ClientAddr(address): ClientAddr,
    Form(form): Form<ResetRequestForm>,
) -> Result<Html<String>, AppError> {
    // The answer is identical whether or not the account exists, so the
    // form cannot be used to probe for usernames.
    let done = render_message(
        &state,
        None,
        "Check your inbox",
        "If this account has a confirmed email address, a reset link is on its way.",
    );

    let jid = match Jid::parse(form.username.trim()) {
        Ok(jid) => jid,
        Err(_) => return done,
    };

    let user = UserRepository::new(state.db.clone())
        .find_by_jid(&jid)
        .await?;

    let user = match user {
        Some(user) if user.has_confirmed_email() && !user.blocked => user,
        _ => return done,
    };

    let email = match &user.email {
        Some(email) => email.clone(),
        None => return done,
    };

    send_confirmation(
        &state,
        &user,
        Purpose::ResetPassword,
        &email,
        &address,
        serde_json::Value::Null,
    )
    .await?;

    record_stat(&state, request_metric(Purpose::ResetPassword)).await;
    if let Some(id) = user.id {
        log_user(&state, id, &address, "Password reset requested").await;
    }

    done
}

pub async fn confirm_form(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Html<String>, AppError> {
    find_confirmation(&state, &key).await?;
    render(&state, "set_password.html", &base_context(None))
}

pub async fn confirm(
    State(state): State<AppState>,
    ClientAddr(address): ClientAddr,
    Path(key): Path<String>,
    jar: CookieJar,
    Form(form): Form<SetPasswordForm>,
) -> Result<impl IntoResponse, AppError> {
    let confirmation = find_confirmation(&state, &key).await?;

    let user_repo = UserRepository::new(state.db.clone());
    let mut user = user_repo
        .find_by_id(confirmation.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Unknown confirmation"))?;

    user.set_password(&form.password)?;
    state.xmpp.set_password(&user.jid, &form.password).await?;
    user.touch();
    user_repo.update(&user).await?;

    // A reset invalidates every outstanding link and session for the user.
    ConfirmationRepository::new(state.db.clone())
        .delete_for_user(confirmation.user_id)
        .await?;
    SessionRepository::new(state.db.clone())
        .delete_for_user(confirmation.user_id)
        .await?;

    record_stat(&state, confirmed_metric(Purpose::ResetPassword)).await;
    log_user(&state, confirmation.user_id, &address, "Password reset").await;

    let session = Session::new(confirmation.user_id, Some(address));
    SessionRepository::new(state.db.clone())
        .create(&session)
        .await?;

    let cookie = Cookie::build((SESSION_COOKIE, session.id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    Ok((jar.add(cookie), Redirect::to("/account")))
}

async fn find_confirmation(
    state: &AppState,
    key: &str,
) -> Result<roster_core::models::confirmation::Confirmation, AppError> {
    ConfirmationRepository::new(state.db.clone())
        .find_valid(key, Purpose::ResetPassword, Utc::now())
        .await?
        .ok_or_else(|| AppError::not_found("This confirmation link is invalid or has expired"))
}

#[cfg(test)]
mod tests {
    use crate::test_helpers::{
        create_confirmed_user, create_test_state, last_confirmation_key, test_server,
    };
    use anyhow::Result;
    use roster_core::models::jid::Jid;
    use roster_db::repositories::UserRepository;

    #[tokio::test]
    async fn test_reset_flow_changes_password() -> Result<()> {
        let state = create_test_state().await?;
        create_confirmed_user(&state, "alice@example.com", "old password").await?;
        let server = test_server(state.clone())?;

        server
            .post("/account/reset-password")
            .form(&[("username", "alice@example.com")])
            .await
            .assert_status_ok();

        let key = last_confirmation_key(&state).await?;
        let response = server
            .post(&format!("/account/reset-password/confirm/{}", key))
            .form(&[("password", "new password")])
            .await;
        response.assert_status_see_other();

        let jid = Jid::parse("alice@example.com").map_err(anyhow::Error::msg)?;
        let user = UserRepository::new(state.db.clone())
            .find_by_jid(&jid)
            .await?
            .expect("user exists");
        assert!(user.verify_password("new password")?);
        assert!(!user.verify_password("old password")?);

        Ok(())
    }

    #[tokio::test]
    async fn test_reset_does_not_reveal_accounts() -> Result<()> {
        let state = create_test_state().await?;
        let server = test_server(state)?;

        let response = server
            .post("/account/reset-password")
            .form(&[("username", "ghost@example.com")])
            .await;
        response.assert_status_ok();
        response.assert_text_contains("Check your inbox");

        Ok(())
    }

    #[tokio::test]
    async fn test_unconfirmed_email_gets_no_reset_mail() -> Result<()> {
        let state = create_test_state().await?;
        crate::test_helpers::create_test_user(&state, "bob@example.com", "pw").await?;
        let server = test_server(state.clone())?;

        server
            .post("/account/reset-password")
            .form(&[("username", "bob@example.com")])
            .await
            .assert_status_ok();

        assert!(last_confirmation_key(&state).await.is_err());

        Ok(())
    }
}
