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

use axum::{extract::State, response::Html};
use roster_db::repositories::UserRepository;
use serde::Serialize;

use crate::{auth::RequireAdmin, error::AppError, handlers::shared::render, state::AppState};

/// Row shown on the admin account listing. Deliberately narrower than the
/// full user record; password hashes never reach a template context.
#[derive(Serialize)]
struct AccountRow {
    jid: String,
    email: Option<String>,
    last_activity: String,
    blocked: bool,
    is_admin: bool,
}

pub async fn users(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Html<String>, AppError> {
    let users = UserRepository::new(state.db.clone()).list_all().await?;
    let rows: Vec<AccountRow> = users
        .into_iter()
        .map(|user| AccountRow {
            jid: user.jid.to_string(),
            email: user.email,
            last_activity: user.last_activity.format("%Y-%m-%d").to_string(),
            blocked: user.blocked,
            is_admin: user.is_admin,
        })
        .collect();

    let mut context = tera::Context::new();
    context.insert("site_title", "Roster");
    context.insert("current_user", &admin.jid.to_string());
    context.insert("users", &rows);
    render(&state, "admin_users.html", &context)
}

#[cfg(test)]
mod tests {
    use crate::test_helpers::{create_confirmed_user, create_test_state, login, test_server};
    use anyhow::Result;
    use axum::http::StatusCode;
    use roster_db::repositories::UserRepository;

    async fn make_admin(state: &crate::state::AppState, id: i64) -> Result<()> {
        let repo = UserRepository::new(state.db.clone());
        let mut user = repo.find_by_id(id).await?.expect("user exists");
        user.is_admin = true;
        repo.update(&user).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_sees_account_listing() -> Result<()> {
        let state = create_test_state().await?;
        let admin_id = create_confirmed_user(&state, "boss@example.com", "password123").await?;
        make_admin(&state, admin_id).await?;
        create_confirmed_user(&state, "alice@example.com", "password123").await?;

        let server = test_server(state)?;
        login(&server, "boss@example.com", "password123").await;

        let response = server.get("/admin/users").await;
        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("alice@example.com"));
        assert!(body.contains("boss@example.com"));

        Ok(())
    }

    #[tokio::test]
    async fn test_regular_user_is_forbidden() -> Result<()> {
        let state = create_test_state().await?;
        create_confirmed_user(&state, "alice@example.com", "password123").await?;

        let server = test_server(state)?;
        login(&server, "alice@example.com", "password123").await;

        let response = server.get("/admin/users").await;
        response.assert_status(StatusCode::FORBIDDEN);

        Ok(())
    }

    #[tokio::test]
    async fn test_anonymous_is_unauthorized() -> Result<()> {
        let state = create_test_state().await?;
        let server = test_server(state)?;

        let response = server.get("/admin/users").await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        Ok(())
    }
}
