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

use axum::{extract::State, http::StatusCode, response::Html, Form};
use roster_core::models::user::User;
use serde::Deserialize;

use crate::{
    auth::OptionalUser,
    error::AppError,
    handlers::shared::{base_context, check_antispam, render, render_message, ClientAddr},
    mailer::OutgoingMail,
    state::AppState,
};

pub async fn form(
    State(state): State<AppState>,
    OptionalUser(current): OptionalUser,
) -> Result<Html<String>, AppError> {
    render(&state, "contact.html", &base_context(current.as_ref()))
}

#[derive(Debug, Deserialize)]
pub struct ContactForm {
    pub email: String,
    pub subject: String,
    pub message: String,
}

pub async fn submit(
    State(state): State<AppState>,
    OptionalUser(current): OptionalUser,
    ClientAddr(address): ClientAddr,
    Form(form): Form<ContactForm>,
) -> Result<Html<String>, AppError> {
    if state.contact_rate_limiter.check().is_err() {
        return Err(AppError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many messages, try again later",
        ));
    }

    let email = form.email.trim().to_string();
    User::validate_email(&email).map_err(AppError::bad_request)?;

    let subject = form.subject.trim();
    let message = form.message.trim();
    if subject.is_empty() || message.is_empty() {
        return Err(AppError::bad_request("Subject and message are required"));
    }

    check_antispam(&state, Some(&email), &address).await?;

    let from = match &current {
        Some(current) => format!("{} <{}>", current.user.jid, email),
        None => email.clone(),
    };

    state
        .mailer
        .send(OutgoingMail {
            to: state.config.contact_email.clone(),
            subject: format!("[contact] {}", subject),
            body: format!("From: {}\nAddress: {}\n\n{}", from, address, message),
            gpg_fingerprint: None,
        })
        .await
        .map_err(AppError::from)?;

    render_message(
        &state,
        current.as_ref(),
        "Message sent",
        "Thanks, we will get back to you.",
    )
}
