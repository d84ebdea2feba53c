use axum::{
    extract::{Path, State},
    response::Html,
};
use chrono::Utc;
use roster_core::models::certificate::add_colons;
use roster_db::repositories::CertificateRepository;

use crate::{
    auth::OptionalUser,
    error::AppError,
    handlers::shared::{base_context, render},
    state::AppState,
};

pub async fn list(
    State(state): State<AppState>,
    OptionalUser(current): OptionalUser,
) -> Result<Html<String>, AppError> {
    let hostnames = CertificateRepository::new(state.db.clone())
        .list_hostnames()
        .await?;

    let mut context = base_context(current.as_ref());
    context.insert("hostnames", &hostnames);
    render(&state, "certs.html", &context)
}

pub async fn show(
    State(state): State<AppState>,
    OptionalUser(current): OptionalUser,
    Path(hostname): Path<String>,
) -> Result<Html<String>, AppError> {
    let cert = CertificateRepository::new(state.db.clone())
        .find_current(&hostname, Utc::now())
        .await?
        .ok_or_else(|| AppError::not_found("No current certificate for this host"))?;

    let mut context = base_context(current.as_ref());
    // Fingerprints and serial are shown colon-grouped, as gpg and openssl
    // print them.
    context.insert("serial", &cert.serial_display());
    context.insert("sha256", &add_colons(&cert.sha256));
    context.insert("sha512", &add_colons(&cert.sha512));
    context.insert("cert", &cert);
    render(&state, "cert.html", &context)
}

#[cfg(test)]
mod tests {
    use crate::test_helpers::{create_test_state, test_server};
    use anyhow::Result;
    use chrono::{Duration, Utc};
    use roster_core::models::certificate::Certificate;
    use roster_db::repositories::CertificateRepository;

    fn cert(hostname: &str) -> Certificate {
        let now = Utc::now();
        Certificate {
            id: None,
            hostname: hostname.to_string(),
            pem: "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----".to_string(),
            hostnames: vec![hostname.to_string()],
            key_size: 4096,
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(89),
            serial: "BC614E".to_string(),
            sha256: "AA".repeat(32),
            sha512: "BB".repeat(64),
            tlsa: "BB".repeat(64),
            enabled: true,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_list_and_show() -> Result<()> {
        let state = create_test_state().await?;
        CertificateRepository::new(state.db.clone())
            .create(&cert("xmpp.example.com"))
            .await?;

        let server = test_server(state)?;

        let response = server.get("/certs").await;
        response.assert_status_ok();
        response.assert_text_contains("xmpp.example.com");

        let response = server.get("/certs/xmpp.example.com").await;
        response.assert_status_ok();
        response.assert_text_contains("BC:61:4E");
        response.assert_text_contains("AA:AA");

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_host_is_404() -> Result<()> {
        let state = create_test_state().await?;
        let server = test_server(state)?;
        server.get("/certs/missing.example.com").await.assert_status_not_found();
        Ok(())
    }
}
