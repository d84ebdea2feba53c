use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url};
use roster_core::models::jid::Jid;
use serde::Deserialize;
use std::time::Duration;

use crate::backend::XmppBackend;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY_MS: u64 = 500;

/// Talks to the XMPP server's HTTP admin API: one POST per command, JSON
/// bodies, bearer-token auth. Transient transport failures are retried a
/// few times before giving up.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    token: String,
}

#[derive(Debug, Deserialize)]
struct LastActivityResponse {
    timestamp: String,
    #[allow(dead_code)]
    status: String,
}

impl HttpBackend {
    pub fn new(base_url: Url, token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            token: token.to_string(),
        })
    }

    /// POST a command, retrying transport failures. Any HTTP response, error
    /// status included, comes back for the caller to interpret.
    async fn send_with_retry(
        &self,
        command: &str,
        args: &serde_json::Value,
    ) -> Result<reqwest::Response> {
        let url = self
            .base_url
            .join(command)
            .with_context(|| format!("Failed to construct URL for command: {}", command))?;

        let mut attempt = 1;
        loop {
            let result = self
                .client
                .post(url.clone())
                .bearer_auth(&self.token)
                .json(args)
                .send()
                .await;

            match result {
                Ok(response) => return Ok(response),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        command = command,
                        attempt = attempt,
                        error = %e,
                        "XMPP API request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64))
                        .await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Command {} failed after retries", command));
                }
            }
        }
    }

    async fn call(&self, command: &str, args: serde_json::Value) -> Result<serde_json::Value> {
        let response = self.send_with_retry(command, &args).await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .with_context(|| format!("Invalid response for command: {}", command));
        }

        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Command {} failed with status {}: {}", command, status, body)
    }
}

#[async_trait]
impl XmppBackend for HttpBackend {
    async fn create_user(&self, jid: &Jid, password: &str) -> Result<()> {
        self.call(
            "register",
            serde_json::json!({
                "user": jid.node(),
                "host": jid.domain(),
                "password": password,
            }),
        )
        .await?;
        Ok(())
    }

    async fn create_reservation(&self, jid: &Jid) -> Result<()> {
        // A reservation is an account with an unusable random password. The
        // real password arrives once the email address is confirmed.
        let password = uuid_like_password();
        self.create_user(jid, &password).await
    }

    async fn set_password(&self, jid: &Jid, password: &str) -> Result<()> {
        self.call(
            "change_password",
            serde_json::json!({
                "user": jid.node(),
                "host": jid.domain(),
                "newpass": password,
            }),
        )
        .await?;
        Ok(())
    }

    async fn user_exists(&self, jid: &Jid) -> Result<bool> {
        let response = self
            .send_with_retry(
                "check_account",
                &serde_json::json!({ "user": jid.node(), "host": jid.domain() }),
            )
            .await?;

        // The API answers 200 for existing accounts and 404 for unknown ones.
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => {
                let value: serde_json::Value = response
                    .json()
                    .await
                    .context("Invalid check_account response")?;
                Ok(value.as_i64() == Some(0))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("check_account failed with status {}: {}", status, body)
            }
        }
    }

    async fn remove_user(&self, jid: &Jid) -> Result<()> {
        self.call(
            "unregister",
            serde_json::json!({ "user": jid.node(), "host": jid.domain() }),
        )
        .await?;
        Ok(())
    }

    async fn all_users(&self, domain: &str) -> Result<Vec<Jid>> {
        let value = self
            .call("registered_users", serde_json::json!({ "host": domain }))
            .await?;

        let nodes: Vec<String> =
            serde_json::from_value(value).context("Invalid registered_users response")?;

        nodes
            .into_iter()
            .map(|node| {
                Jid::new(&node, domain)
                    .map_err(|e| anyhow::anyhow!("Invalid username from server: {}", e))
            })
            .collect()
    }

    async fn last_activity(&self, jid: &Jid) -> Result<Option<DateTime<Utc>>> {
        let value = self
            .call(
                "get_last",
                serde_json::json!({ "user": jid.node(), "host": jid.domain() }),
            )
            .await?;

        let response: LastActivityResponse =
            serde_json::from_value(value).context("Invalid get_last response")?;

        if response.timestamp == "Never" {
            return Ok(None);
        }

        let stamp = DateTime::parse_from_rfc3339(&response.timestamp)
            .with_context(|| format!("Invalid timestamp from server: {}", response.timestamp))?;

        Ok(Some(stamp.with_timezone(&Utc)))
    }
}

/// Random unguessable placeholder password for reserved accounts.
fn uuid_like_password() -> String {
    format!("!reserved-{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn respond(mut stream: TcpStream, status: &str, body: &str) {
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf).await;
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        let _ = stream.write_all(response.as_bytes()).await;
    }

    #[tokio::test]
    async fn test_user_exists_maps_404_to_false() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            respond(stream, "404 Not Found", "\"not found\"").await;
        });

        let url = Url::parse(&format!("http://{}/api/", addr))?;
        let backend = HttpBackend::new(url, "secret")?;
        let jid = Jid::parse("alice@example.com").map_err(anyhow::Error::msg)?;

        assert!(!backend.user_exists(&jid).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_user_exists_retries_transport_failures() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            // First connection is dropped without an answer; the second
            // reports an existing account.
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
            let (stream, _) = listener.accept().await.unwrap();
            respond(stream, "200 OK", "0").await;
        });

        let url = Url::parse(&format!("http://{}/api/", addr))?;
        let backend = HttpBackend::new(url, "secret")?;
        let jid = Jid::parse("alice@example.com").map_err(anyhow::Error::msg)?;

        assert!(backend.user_exists(&jid).await?);
        Ok(())
    }

    #[test]
    fn test_new_backend() {
        let url = Url::parse("https://xmpp.example.com/api/").unwrap();
        let backend = HttpBackend::new(url, "secret").unwrap();
        assert_eq!(backend.base_url.as_str(), "https://xmpp.example.com/api/");
    }

    #[test]
    fn test_command_urls_join_base() {
        let url = Url::parse("https://xmpp.example.com/api/").unwrap();
        let backend = HttpBackend::new(url, "secret").unwrap();
        let joined = backend.base_url.join("register").unwrap();
        assert_eq!(joined.as_str(), "https://xmpp.example.com/api/register");
    }

    #[test]
    fn test_reservation_passwords_are_unusable_and_unique() {
        let a = uuid_like_password();
        let b = uuid_like_password();
        assert!(a.starts_with("!reserved-"));
        assert_ne!(a, b);
    }
}
