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
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect},
    Form,
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use roster_core::models::{jid::Jid, session::Session, stat::STAT_FAILED_LOGIN};
use roster_db::repositories::{SessionRepository, UserRepository};
use serde::Deserialize;

use crate::{
    auth::{OptionalUser, SESSION_COOKIE},
    error::AppError,
    handlers::shared::{base_context, log_user, record_stat, render, ClientAddr},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

pub async fn login_form(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let context = base_context(None);
    render(&state, "login.html", &context)
}

pub async fn login(
    State(state): State<AppState>,
    ClientAddr(address): ClientAddr,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, AppError> {
    if state.login_rate_limiter.check().is_err() {
        return Err(AppError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many login attempts, try again later",
        ));
    }

    let failed = || async {
        record_stat(&state, STAT_FAILED_LOGIN).await;
        let mut context = base_context(None);
        context.insert("error", "Invalid username or password");
        render(&state, "login.html", &context)
    };

    let jid = match Jid::parse(form.username.trim()) {
        Ok(jid) => jid,
        Err(_) => return Ok(failed().await?.into_response()),
    };

    let user = UserRepository::new(state.db.clone())
        .find_by_jid(&jid)
        .await?;

    let user = match user {
        Some(user) if !user.blocked && user.verify_password(&form.password).unwrap_or(false) => {
            user
        }
        Some(user) => {
            if let Some(id) = user.id {
                log_user(&state, id, &address, "Failed login attempt").await;
            }
            return Ok(failed().await?.into_response());
        }
        None => return Ok(failed().await?.into_response()),
    };

    let user_id = user
        .id
        .ok_or_else(|| AppError::internal_server_error("User without id"))?;

    let session = Session::new(user_id, Some(address.clone()));
    SessionRepository::new(state.db.clone())
        .create(&session)
        .await?;

    UserRepository::new(state.db.clone())
        .set_last_activity(user_id, chrono::Utc::now())
        .await?;
    log_user(&state, user_id, &address, "Logged in").await;

    let cookie = Cookie::build((SESSION_COOKIE, session.id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    Ok((jar.add(cookie), Redirect::to("/account")).into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    OptionalUser(current): OptionalUser,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(current) = current {
        SessionRepository::new(state.db.clone())
            .delete(&current.session.id)
            .await?;
    }

    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
    Ok((jar, Redirect::to("/")))
}
