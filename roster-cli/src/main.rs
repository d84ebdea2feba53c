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

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use roster_core::models::{
    blog::{BlogPost, Page},
    certificate::{int_to_hex, Certificate},
    jid::Jid,
    user::{RegistrationMethod, User},
};
use roster_db::repositories::{
    BlockedEmailRepository, BlockedIpRepository, BlogPostRepository, CertificateRepository,
    PageRepository, UserRepository,
};
use roster_web::{
    config::Config,
    mailer::{Mailer, TracingMailer},
};
use roster_worker::SweepSettings;
use roster_xmpp::{HttpBackend, MemoryBackend, XmppBackend};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Roster CLI tool for account and content management")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database (create tables)
    Init,

    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Import accounts from the XMPP server directory
    Import {
        /// Domain to import, defaults to every managed host
        #[arg(long)]
        domain: Option<String>,
    },

    /// Certificate management commands
    Cert {
        #[command(subcommand)]
        command: CertCommands,
    },

    /// Blog post management commands
    Post {
        #[command(subcommand)]
        command: PostCommands,
    },

    /// Static page management commands
    Page {
        #[command(subcommand)]
        command: PageCommands,
    },

    /// Block an email address or client IP from making submissions
    Block {
        /// Email address or IP address
        address: String,
        /// Block indefinitely instead of using the configured timeout
        #[arg(long)]
        forever: bool,
    },

    /// Remove an email address or client IP from the blocklist
    Unblock {
        /// Email address or IP address
        address: String,
    },

    /// Run every housekeeping sweep once
    Sweep,
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create an account locally and on the XMPP server
    Create {
        /// Full JID, e.g. alice@example.com
        jid: String,
        /// Contact email address
        #[arg(long)]
        email: Option<String>,
        /// Make the user an admin
        #[arg(long)]
        admin: bool,
        /// Password (will prompt if not provided)
        #[arg(long)]
        password: Option<String>,
    },

    /// Change a user's password
    Password {
        /// Full JID
        jid: String,
        /// New password (will prompt if not provided)
        #[arg(long)]
        password: Option<String>,
    },

    /// Remove an account locally and from the XMPP server
    Delete {
        /// Full JID
        jid: String,
    },

    /// List all accounts
    List,
}

#[derive(Subcommand)]
enum CertCommands {
    /// Import pre-parsed certificate metadata from a JSON file
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// List stored certificates
    List,
}

#[derive(Subcommand)]
enum PostCommands {
    /// Create a blog post from a markdown file
    Create {
        /// Post title
        title: String,
        /// Path to the markdown body
        file: PathBuf,
        /// JID of the author
        #[arg(long)]
        author: String,
        /// Pin the post to the top of the index
        #[arg(long)]
        sticky: bool,
    },
}

#[derive(Subcommand)]
enum PageCommands {
    /// Create a static page from a markdown file
    Create {
        /// Page title
        title: String,
        /// Path to the markdown body
        file: PathBuf,
        /// JID of the author
        #[arg(long)]
        author: String,
    },
}

/// JSON shape accepted by `cert import`. The values come out of whatever
/// tooling parsed the PEM.
#[derive(Debug, Deserialize)]
struct CertificateImport {
    hostname: String,
    pem: String,
    hostnames: Vec<String>,
    key_size: i64,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    serial: Serial,
    sha256: String,
    sha512: String,
    tlsa: String,
}

/// Serials arrive either as the raw integer openssl reports or already
/// hex-encoded; both are stored as uppercase hex.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Serial {
    Number(u64),
    Hex(String),
}

impl Serial {
    fn into_hex(self) -> String {
        match self {
            Serial::Number(value) => int_to_hex(value.into()),
            Serial::Hex(value) => value.to_uppercase(),
        }
    }
}

impl CertificateImport {
    fn into_certificate(self) -> Certificate {
        Certificate {
            id: None,
            hostname: self.hostname,
            pem: self.pem,
            hostnames: self.hostnames,
            key_size: self.key_size,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            serial: self.serial.into_hex(),
            sha256: self.sha256,
            sha512: self.sha512,
            tlsa: self.tlsa,
            enabled: true,
            created_at: Utc::now(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Init => {
            println!("Initializing database at: {}", config.database_url);
            let _pool = roster_db::init_database(&config.database_url).await?;
            println!("Database initialized successfully!");
            Ok(())
        }
        Commands::User { command } => {
            let pool = roster_db::init_database(&config.database_url).await?;
            let xmpp = build_backend(&config)?;
            handle_user_command(command, pool, xmpp.as_ref()).await
        }
        Commands::Import { domain } => {
            let pool = roster_db::init_database(&config.database_url).await?;
            let xmpp = build_backend(&config)?;
            let domains = match domain {
                Some(domain) => vec![domain],
                None => config.xmpp_hosts.clone(),
            };
            import_accounts(pool, xmpp.as_ref(), &domains).await
        }
        Commands::Cert { command } => {
            let pool = roster_db::init_database(&config.database_url).await?;
            handle_cert_command(command, pool).await
        }
        Commands::Post { command } => {
            let pool = roster_db::init_database(&config.database_url).await?;
            handle_post_command(command, pool).await
        }
        Commands::Page { command } => {
            let pool = roster_db::init_database(&config.database_url).await?;
            handle_page_command(command, pool).await
        }
        Commands::Block { address, forever } => {
            let pool = roster_db::init_database(&config.database_url).await?;
            block_address(
                pool,
                &address,
                forever,
                config.blocked_email_timeout_hours,
                config.blocked_ip_timeout_hours,
            )
            .await
        }
        Commands::Unblock { address } => {
            let pool = roster_db::init_database(&config.database_url).await?;
            unblock_address(pool, &address).await
        }
        Commands::Sweep => {
            let pool = roster_db::init_database(&config.database_url).await?;
            let xmpp = build_backend(&config)?;
            let mailer: Arc<dyn Mailer> = Arc::new(TracingMailer);
            let settings = SweepSettings {
                base_url: config.canonical_base_url.clone(),
                account_expires_days: config.account_expires_days,
                account_expires_notification_days: config.account_expires_notification_days,
                user_log_retention_days: config.user_log_retention_days,
            };
            roster_worker::run_all(&pool, xmpp.as_ref(), mailer.as_ref(), &settings).await;
            println!("Sweeps completed.");
            Ok(())
        }
    }
}

fn build_backend(config: &Config) -> Result<Arc<dyn XmppBackend>> {
    match &config.xmpp_api_url {
        Some(api_url) => Ok(Arc::new(HttpBackend::new(
            Url::parse(api_url).context("Invalid XMPP_API_URL")?,
            &config.xmpp_api_token,
        )?)),
        None => {
            eprintln!("Warning: XMPP_API_URL not set, backend changes are not persisted");
            Ok(Arc::new(MemoryBackend::default()))
        }
    }
}

fn get_password(password: Option<String>) -> Result<String> {
    match password {
        Some(password) => Ok(password),
        None => {
            let password = rpassword::prompt_password("Password: ")?;
            let confirm = rpassword::prompt_password("Confirm password: ")?;
            if password != confirm {
                anyhow::bail!("Passwords do not match");
            }
            Ok(password)
        }
    }
}

async fn handle_user_command(
    command: UserCommands,
    pool: SqlitePool,
    xmpp: &dyn XmppBackend,
) -> Result<()> {
    let repo = UserRepository::new(pool.clone());

    match command {
        UserCommands::Create {
            jid,
            email,
            admin,
            password,
        } => {
            let jid = Jid::parse(&jid).map_err(anyhow::Error::msg)?;
            if repo.jid_exists(&jid).await? {
                anyhow::bail!("Account already exists: {}", jid);
            }

            let password = get_password(password)?;
            let mut user = User::new(jid.clone(), email, password.as_str())?;
            user.registration_method = RegistrationMethod::Manual;
            user.is_admin = admin;
            user.created_in_backend = true;
            if user.email.is_some() {
                user.confirm();
            }

            xmpp.create_user(&jid, &password).await?;
            repo.create(&user).await?;

            println!("Created account {}", jid);
            Ok(())
        }

        UserCommands::Password { jid, password } => {
            let jid = Jid::parse(&jid).map_err(anyhow::Error::msg)?;
            let mut user = repo
                .find_by_jid(&jid)
                .await?
                .with_context(|| format!("No such account: {}", jid))?;

            let password = get_password(password)?;
            user.set_password(&password)?;
            repo.update(&user).await?;
            if user.created_in_backend {
                xmpp.set_password(&jid, &password).await?;
            }

            println!("Password changed for {}", jid);
            Ok(())
        }

        UserCommands::Delete { jid } => {
            let jid = Jid::parse(&jid).map_err(anyhow::Error::msg)?;
            let user = repo
                .find_by_jid(&jid)
                .await?
                .with_context(|| format!("No such account: {}", jid))?;

            if user.created_in_backend {
                xmpp.remove_user(&jid).await?;
            }
            if let Some(id) = user.id {
                repo.delete(id).await?;
            }

            println!("Deleted account {}", jid);
            Ok(())
        }

        UserCommands::List => {
            for user in repo.list_all().await? {
                println!(
                    "{}\t{}\tlast seen {}",
                    user.jid,
                    user.email.as_deref().unwrap_or("-"),
                    user.last_activity.format("%Y-%m-%d"),
                );
            }
            Ok(())
        }
    }
}

/// Bring accounts that only exist on the XMPP server into the local
/// database, carrying their last activity over. Existing rows are left
/// untouched.
async fn import_accounts(
    pool: SqlitePool,
    xmpp: &dyn XmppBackend,
    domains: &[String],
) -> Result<()> {
    let repo = UserRepository::new(pool);
    let mut imported = 0;

    for domain in domains {
        for jid in xmpp.all_users(domain).await? {
            if repo.jid_exists(&jid).await? {
                continue;
            }

            // Random placeholder password; the account holder can pick a
            // real one through the reset flow once an email is on file.
            let mut user = User::new(jid.clone(), None, &uuid::Uuid::new_v4().to_string())?;
            user.registration_method = RegistrationMethod::Unknown;
            user.created_in_backend = true;
            if let Some(seen) = xmpp.last_activity(&jid).await? {
                user.last_activity = seen;
            }

            repo.create(&user).await?;
            println!("Imported {}", jid);
            imported += 1;
        }
    }

    println!("Imported {} accounts.", imported);
    Ok(())
}

/// Add an address to the blocklist. IPs and emails go to separate tables
/// with separate configured timeouts; `forever` blocks without expiry.
async fn block_address(
    pool: SqlitePool,
    address: &str,
    forever: bool,
    email_timeout_hours: i64,
    ip_timeout_hours: i64,
) -> Result<()> {
    if address.parse::<IpAddr>().is_ok() {
        let expires_at = (!forever).then(|| Utc::now() + Duration::hours(ip_timeout_hours));
        BlockedIpRepository::new(pool).block(address, expires_at).await?;
        println!("Blocked IP {}", address);
    } else if address.contains('@') {
        let expires_at = (!forever).then(|| Utc::now() + Duration::hours(email_timeout_hours));
        BlockedEmailRepository::new(pool)
            .block(address, expires_at)
            .await?;
        println!("Blocked email {}", address);
    } else {
        anyhow::bail!("Not an email or IP address: {}", address);
    }

    Ok(())
}

async fn unblock_address(pool: SqlitePool, address: &str) -> Result<()> {
    if address.parse::<IpAddr>().is_ok() {
        BlockedIpRepository::new(pool).unblock(address).await?;
    } else {
        BlockedEmailRepository::new(pool).unblock(address).await?;
    }

    println!("Unblocked {}", address);
    Ok(())
}

async fn handle_cert_command(command: CertCommands, pool: SqlitePool) -> Result<()> {
    let repo = CertificateRepository::new(pool);

    match command {
        CertCommands::Import { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let import: CertificateImport =
                serde_json::from_str(&json).context("Invalid certificate JSON")?;
            let cert = import.into_certificate();

            let hostname = cert.hostname.clone();
            repo.create(&cert).await?;
            println!("Imported certificate for {}", hostname);
            Ok(())
        }

        CertCommands::List => {
            for hostname in repo.list_hostnames().await? {
                match repo.find_current(&hostname, Utc::now()).await? {
                    Some(cert) => println!(
                        "{}\tserial {}\tvalid until {}",
                        hostname,
                        cert.serial_display(),
                        cert.valid_until.format("%Y-%m-%d"),
                    ),
                    None => println!("{}\tno current certificate", hostname),
                }
            }
            Ok(())
        }
    }
}

async fn resolve_author(pool: &SqlitePool, jid: &str) -> Result<i64> {
    let jid = Jid::parse(jid).map_err(anyhow::Error::msg)?;
    let user = UserRepository::new(pool.clone())
        .find_by_jid(&jid)
        .await?
        .with_context(|| format!("No such account: {}", jid))?;
    user.id.context("Author account has no id")
}

async fn handle_post_command(command: PostCommands, pool: SqlitePool) -> Result<()> {
    match command {
        PostCommands::Create {
            title,
            file,
            author,
            sticky,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let author_id = resolve_author(&pool, &author).await?;

            let mut post = BlogPost::new(&title, &text, author_id);
            post.sticky = sticky;
            BlogPostRepository::new(pool).create(&post).await?;

            println!("Created post /blog/{}", post.slug);
            Ok(())
        }
    }
}

async fn handle_page_command(command: PageCommands, pool: SqlitePool) -> Result<()> {
    match command {
        PageCommands::Create {
            title,
            file,
            author,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let author_id = resolve_author(&pool, &author).await?;

            let page = Page::new(&title, &text, author_id);
            PageRepository::new(pool).create(&page).await?;

            println!("Created page /p/{}", page.slug);
            Ok(())
        }
    }
}
