use anyhow::{anyhow, Result};
use axum_test::TestServer;
use roster_core::models::{jid::Jid, user::User};
use roster_db::repositories::UserRepository;
use roster_xmpp::MemoryBackend;
use std::sync::Arc;

use crate::{
    config::Config,
    dnsbl::DnsblChecker,
    mailer::RecordingMailer,
    rate_limit::create_rate_limiter,
    routes::create_router,
    state::AppState,
    templates::init_templates,
};

/// Fully wired [`AppState`] over an in-memory database, an in-process XMPP
/// backend and a recording mailer.
pub async fn create_test_state() -> Result<AppState> {
    let db = roster_db::open_memory().await?;

    let templates_dir = tempfile::tempdir()?;
    let templates = init_templates(
        templates_dir
            .path()
            .to_str()
            .ok_or_else(|| anyhow!("Non-UTF8 temp dir"))?,
    )?;

    let config = Config::test_config();
    let mailer = Arc::new(RecordingMailer::default());

    let mut state = AppState::new(
        db,
        templates,
        config.clone(),
        Arc::new(MemoryBackend::default()),
        mailer.clone(),
        Arc::new(DnsblChecker::new(Vec::new())),
        create_rate_limiter(config.login_rate_limit_per_minute),
        create_rate_limiter(config.register_rate_limit_per_minute),
        create_rate_limiter(config.contact_rate_limit_per_minute),
    );
    state.recording_mailer = mailer;

    Ok(state)
}

pub fn test_server(state: AppState) -> Result<TestServer> {
    let server = TestServer::builder()
        .save_cookies()
        .build(create_router(state))
        .map_err(|e| anyhow!("{}", e))?;
    Ok(server)
}

/// Store a user row directly, bypassing the registration flow. The matching
/// XMPP backend account is created too, as the real flow would.
pub async fn create_test_user(state: &AppState, jid: &str, password: &str) -> Result<i64> {
    let jid = Jid::parse(jid).map_err(anyhow::Error::msg)?;
    let email = format!("{}@mail.example", jid.node());
    let user = User::new(jid.clone(), Some(email), password)?;
    state.xmpp.create_user(&jid, password).await?;
    UserRepository::new(state.db.clone()).create(&user).await
}

/// Like [`create_test_user`], but with the email address already confirmed.
pub async fn create_confirmed_user(state: &AppState, jid: &str, password: &str) -> Result<i64> {
    let jid = Jid::parse(jid).map_err(anyhow::Error::msg)?;
    let email = format!("{}@mail.example", jid.node());
    let mut user = User::new(jid.clone(), Some(email), password)?;
    user.confirm();
    state.xmpp.create_user(&jid, password).await?;
    UserRepository::new(state.db.clone()).create(&user).await
}

/// Log in through the real handler so the server holds a session cookie.
pub async fn login(server: &TestServer, username: &str, password: &str) {
    let response = server
        .post("/login")
        .form(&[("username", username), ("password", password)])
        .await;
    response.assert_status_see_other();
}

/// Key of the most recently stored confirmation. Errors when none exists,
/// which some tests assert on.
pub async fn last_confirmation_key(state: &AppState) -> Result<String> {
    let key: Option<(String,)> =
        sqlx::query_as("SELECT key FROM confirmations ORDER BY id DESC LIMIT 1")
            .fetch_optional(&state.db)
            .await?;
    key.map(|(k,)| k)
        .ok_or_else(|| anyhow!("No confirmation stored"))
}
