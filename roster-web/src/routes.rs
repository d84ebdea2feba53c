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
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{handlers, AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Public site
        .route("/", get(handlers::blog::index))
        .route("/blog/{slug}", get(handlers::blog::show_post))
        .route("/p/{slug}", get(handlers::pages::show))
        .route("/feed/atom", get(handlers::feed::atom))
        .route("/certs", get(handlers::certs::list))
        .route("/certs/{hostname}", get(handlers::certs::show))
        .route("/contact", get(handlers::contact::form).post(handlers::contact::submit))
        // Authentication
        .route("/login", get(handlers::auth::login_form).post(handlers::auth::login))
        .route("/logout", get(handlers::auth::logout).post(handlers::auth::logout))
        // Registration
        .route(
            "/register",
            get(handlers::register::register_form).post(handlers::register::register),
        )
        .route("/api/availability", post(handlers::register::check_availability))
        .route(
            "/account/register/confirm/{key}",
            get(handlers::register::confirm_form).post(handlers::register::confirm),
        )
        // Password reset (works logged out)
        .route(
            "/account/reset-password",
            get(handlers::reset::form).post(handlers::reset::request),
        )
        .route(
            "/account/reset-password/confirm/{key}",
            get(handlers::reset::confirm_form).post(handlers::reset::confirm),
        )
        // Account management
        .route("/account", get(handlers::account::detail))
        .route("/account/password", post(handlers::account::set_password))
        .route("/account/preferences", post(handlers::account::preferences))
        .route("/account/gpg", post(handlers::account::upload_gpg_key))
        .route("/account/set-email", post(handlers::account::set_email))
        .route(
            "/account/set-email/confirm/{key}",
            get(handlers::account::confirm_email),
        )
        .route("/account/delete", post(handlers::delete::request))
        .route(
            "/account/delete/confirm/{key}",
            get(handlers::delete::confirm_form).post(handlers::delete::confirm),
        )
        // Admin
        .route("/admin/users", get(handlers::admin::users))
        // Health check
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}
