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
    http::StatusCode,
    response::{Html, IntoResponse, Redirect},
    Form,
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use chrono::Utc;
use roster_core::models::{confirmation::Purpose, jid::Jid, session::Session, user::User};
use roster_db::repositories::{ConfirmationRepository, UserRepository};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::SESSION_COOKIE,
    error::AppError,
    handlers::shared::{
        base_context, check_antispam, confirmed_metric, log_user, record_stat, render,
        render_message, request_metric, send_confirmation, ClientAddr,
    },
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub domain: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityForm {
    pub username: String,
    pub domain: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordForm {
    pub password: String,
}

pub async fn register_form(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let mut context = base_context(None);
    context.insert("hosts", &state.config.xmpp_hosts);
    context.insert("default_host", state.config.default_host());
    render(&state, "register.html", &context)
}

pub async fn register(
    State(state): State<AppState>,
    ClientAddr(address): ClientAddr,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<impl IntoResponse, AppError> {
    if state.register_rate_limiter.check().is_err() {
        return Err(AppError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many registrations, try again later",
        ));
    }

    let jid = parse_managed_jid(&state, &form.username, &form.domain)?;

    let email = form.email.trim().to_string();
    User::validate_email(&email).map_err(AppError::bad_request)?;

    check_antispam(&state, Some(&email), &address).await?;

    if !username_available(&state, &jid).await? {
        return Err(AppError::conflict("This username is already taken"));
    }

    // The real password arrives with the confirmation. Until then the
    // account carries an unguessable placeholder.
    let user = User::new(jid.clone(), Some(email.clone()), &Uuid::new_v4().to_string())?;

    let user_repo = UserRepository::new(state.db.clone());
    let user_id = user_repo.create(&user).await?;

    if let Err(e) = state.xmpp.create_reservation(&jid).await {
        // Roll back so the name is not stuck half-registered locally.
        user_repo.delete(user_id).await?;
        return Err(AppError::from(e));
    }

    let mut stored = user;
    stored.id = Some(user_id);
    send_confirmation(
        &state,
        &stored,
        Purpose::Register,
        &email,
        &address,
        serde_json::json!({ "email": email }),
    )
    .await?;

    record_stat(&state, request_metric(Purpose::Register)).await;
    log_user(&state, user_id, &address, "Account registered").await;

    // The new account is logged in right away and can use the site while
    // the confirmation mail is in transit.
    let session = Session::new(user_id, Some(address));
    roster_db::repositories::SessionRepository::new(state.db.clone())
        .create(&session)
        .await?;
    let cookie = Cookie::build((SESSION_COOKIE, session.id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    let page = render_message(
        &state,
        None,
        "Check your inbox",
        "We sent you a link to confirm your address and choose a password.",
    )?;

    Ok((jar.add(cookie), page))
}

/// Availability check used by the registration form and by other clients.
/// Answers 409 when the name is taken; results are cached briefly.
pub async fn check_availability(
    State(state): State<AppState>,
    Form(form): Form<AvailabilityForm>,
) -> Result<impl IntoResponse, AppError> {
    let jid = parse_managed_jid(&state, &form.username, &form.domain)?;

    if username_available(&state, &jid).await? {
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::CONFLICT)
    }
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

    user.confirm();
    user.created_in_backend = true;
    user.touch();
    user_repo.update(&user).await?;

    let confirmation_id = confirmation
        .id
        .ok_or_else(|| AppError::internal_server_error("Confirmation without id"))?;
    ConfirmationRepository::new(state.db.clone())
        .delete(confirmation_id)
        .await?;

    record_stat(&state, confirmed_metric(Purpose::Register)).await;
    log_user(&state, confirmation.user_id, &address, "Email address confirmed").await;

    // Log the fresh account in right away.
    let session = Session::new(confirmation.user_id, Some(address));
    roster_db::repositories::SessionRepository::new(state.db.clone())
        .create(&session)
        .await?;

    let cookie = Cookie::build((SESSION_COOKIE, session.id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    Ok((jar.add(cookie), Redirect::to("/account")))
}

fn parse_managed_jid(state: &AppState, username: &str, domain: &str) -> Result<Jid, AppError> {
    let domain = domain.trim();
    if !state.config.is_managed_host(domain) {
        return Err(AppError::bad_request("Unknown domain"));
    }
    Jid::new(username.trim(), domain).map_err(AppError::bad_request)
}

async fn username_available(state: &AppState, jid: &Jid) -> Result<bool, AppError> {
    let key = jid.to_string();
    if let Some(available) = state.availability_cache.get(&key).await {
        return Ok(available);
    }

    let taken_locally = UserRepository::new(state.db.clone()).jid_exists(jid).await?;
    let available = if taken_locally {
        false
    } else {
        !state.xmpp.user_exists(jid).await?
    };

    state.availability_cache.put(&key, available).await;
    Ok(available)
}

async fn find_confirmation(
    state: &AppState,
    key: &str,
) -> Result<roster_core::models::confirmation::Confirmation, AppError> {
    ConfirmationRepository::new(state.db.clone())
        .find_valid(key, Purpose::Register, Utc::now())
        .await?
        .ok_or_else(|| AppError::not_found("This confirmation link is invalid or has expired"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{create_test_state, test_server};
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use roster_db::repositories::UserRepository;

    #[tokio::test]
    async fn test_register_form_preselects_first_host() -> Result<()> {
        let state = create_test_state().await?;
        let server = test_server(state)?;

        let response = server.get("/register").await;
        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("<option selected>example.com</option>"));
        assert!(body.contains("<option>example.net</option>"));

        Ok(())
    }

    #[tokio::test]
    async fn test_register_creates_reservation_and_confirmation() -> Result<()> {
        let state = create_test_state().await?;
        let server = test_server(state.clone())?;

        let response = server
            .post("/register")
            .form(&[
                ("username", "alice"),
                ("domain", "example.com"),
                ("email", "alice@mail.example"),
            ])
            .await;

        response.assert_status_ok();
        response.assert_text_contains("Check your inbox");

        let jid = Jid::parse("alice@example.com").map_err(anyhow::Error::msg)?;
        let user = UserRepository::new(state.db.clone())
            .find_by_jid(&jid)
            .await?
            .expect("user stored");
        assert!(!user.created_in_backend);
        assert!(user.confirmed_at.is_none());

        assert!(state.xmpp.user_exists(&jid).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_register_rejects_unmanaged_domain() -> Result<()> {
        let state = create_test_state().await?;
        let server = test_server(state)?;

        let response = server
            .post("/register")
            .form(&[
                ("username", "alice"),
                ("domain", "evil.example"),
                ("email", "alice@mail.example"),
            ])
            .await;

        response.assert_status_bad_request();

        Ok(())
    }

    #[tokio::test]
    async fn test_availability_conflict_for_taken_name() -> Result<()> {
        let state = create_test_state().await?;
        let jid = Jid::parse("alice@example.com").map_err(anyhow::Error::msg)?;
        state.xmpp.create_user(&jid, "pw").await?;
        let server = test_server(state)?;

        let response = server
            .post("/api/availability")
            .form(&[("username", "alice"), ("domain", "example.com")])
            .await;
        assert_eq!(response.status_code(), StatusCode::CONFLICT);

        let response = server
            .post("/api/availability")
            .form(&[("username", "bob"), ("domain", "example.com")])
            .await;
        response.assert_status_ok();

        Ok(())
    }

    #[tokio::test]
    async fn test_availability_answer_is_cached() -> Result<()> {
        let state = create_test_state().await?;
        let server = test_server(state.clone())?;

        let response = server
            .post("/api/availability")
            .form(&[("username", "carol"), ("domain", "example.com")])
            .await;
        response.assert_status_ok();

        // The name is taken now, but the cached verdict still says free.
        let jid = Jid::parse("carol@example.com").map_err(anyhow::Error::msg)?;
        state.xmpp.create_user(&jid, "pw").await?;

        let response = server
            .post("/api/availability")
            .form(&[("username", "carol"), ("domain", "example.com")])
            .await;
        response.assert_status_ok();

        Ok(())
    }

    #[tokio::test]
    async fn test_confirmation_flow_sets_password_and_logs_in() -> Result<()> {
        let state = create_test_state().await?;
        let server = test_server(state.clone())?;

        server
            .post("/register")
            .form(&[
                ("username", "alice"),
                ("domain", "example.com"),
                ("email", "alice@mail.example"),
            ])
            .await
            .assert_status_ok();

        // Fish the key out of the recorded confirmation mail.
        let key = crate::test_helpers::last_confirmation_key(&state).await?;

        let response = server
            .post(&format!("/account/register/confirm/{}", key))
            .form(&[("password", "correct horse")])
            .await;
        response.assert_status_see_other();

        let jid = Jid::parse("alice@example.com").map_err(anyhow::Error::msg)?;
        let user = UserRepository::new(state.db.clone())
            .find_by_jid(&jid)
            .await?
            .expect("user stored");
        assert!(user.created_in_backend);
        assert!(user.has_confirmed_email());
        assert!(user.verify_password("correct horse")?);

        // The key is single use.
        let response = server
            .post(&format!("/account/register/confirm/{}", key))
            .form(&[("password", "again")])
            .await;
        response.assert_status_not_found();

        Ok(())
    }

    #[tokio::test]
    async fn test_register_blocked_email_rejected() -> Result<()> {
        let state = create_test_state().await?;
        roster_db::repositories::BlockedEmailRepository::new(state.db.clone())
            .block("spammer@mail.example", None)
            .await?;
        let server = test_server(state)?;

        let response = server
            .post("/register")
            .form(&[
                ("username", "spammer"),
                ("domain", "example.com"),
                ("email", "s.p.a.m.m.e.r@mail.example"),
            ])
            .await;

        // Dot aliases only collapse on Gmail domains, so this variant is a
        // distinct address and passes the blocklist.
        response.assert_status_ok();

        let response = server
            .post("/register")
            .form(&[
                ("username", "spammer2"),
                ("domain", "example.com"),
                ("email", "spammer+tag@mail.example"),
            ])
            .await;
        response.assert_status_forbidden();

        Ok(())
    }
}
