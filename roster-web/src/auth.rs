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
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    RequestPartsExt,
};
use roster_core::models::{session::Session, user::User};
use roster_db::repositories::{SessionRepository, UserRepository};
use sqlx::SqlitePool;

pub const SESSION_COOKIE: &str = "session_id";

/// Current authenticated user, resolved from the session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session: Session,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    SqlitePool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session_id = extract_session_id(parts).await?;
        let pool = SqlitePool::from_ref(state);

        let session = SessionRepository::new(pool.clone())
            .find_by_id(&session_id)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Database error"))?
            .ok_or((StatusCode::UNAUTHORIZED, "Invalid session"))?;

        if session.is_expired() {
            return Err((StatusCode::UNAUTHORIZED, "Session expired"));
        }

        let user = UserRepository::new(pool)
            .find_by_id(session.user_id)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Database error"))?
            .ok_or((StatusCode::UNAUTHORIZED, "User not found"))?;

        if user.blocked {
            return Err((StatusCode::FORBIDDEN, "Account disabled"));
        }

        Ok(CurrentUser { user, session })
    }
}

/// Like [`CurrentUser`], but anonymous visitors pass through as `None`.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalUser
where
    SqlitePool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(OptionalUser(Some(user))),
            Err((status, _)) if status == StatusCode::UNAUTHORIZED => Ok(OptionalUser(None)),
            Err(e) => Err(e),
        }
    }
}

/// Require an admin account.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub User);

impl<S> FromRequestParts<S> for RequireAdmin
where
    SqlitePool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser { user, .. } = CurrentUser::from_request_parts(parts, state).await?;

        if !user.is_admin {
            return Err((StatusCode::FORBIDDEN, "Admin access required"));
        }

        Ok(RequireAdmin(user))
    }
}

async fn extract_session_id(parts: &mut Parts) -> Result<String, (StatusCode, &'static str)> {
    let cookies = parts.extract::<axum_extra::extract::CookieJar>().await.ok();

    if let Some(cookies) = cookies {
        if let Some(cookie) = cookies.get(SESSION_COOKIE) {
            return Ok(cookie.value().to_string());
        }
    }

    Err((StatusCode::UNAUTHORIZED, "No session found"))
}
