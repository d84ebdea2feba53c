use anyhow::Result;
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::jid::Jid;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9._%+-]*[a-zA-Z0-9])?@[a-zA-Z0-9]([a-zA-Z0-9.-]*[a-zA-Z0-9])?\.[a-zA-Z]{2,}$")
        .expect("Failed to compile email regex")
});

/// How an account originally came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationMethod {
    Website,
    InBand,
    Manual,
    Unknown,
}

impl RegistrationMethod {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Website => 0,
            Self::InBand => 1,
            Self::Manual => 2,
            Self::Unknown => 9,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        match value {
            0 => Self::Website,
            1 => Self::InBand,
            2 => Self::Manual,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Option<i64>,
    pub jid: Jid,
    /// Contact address. Unset for accounts imported from the XMPP server.
    pub email: Option<String>,
    pub password_hash: String,
    /// Fingerprint of the GPG key used to encrypt mail to this user.
    pub gpg_fingerprint: Option<String>,
    pub registration_method: RegistrationMethod,
    pub registered_at: DateTime<Utc>,
    /// When the email address was confirmed via a token link.
    pub confirmed_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    /// When the account-expiry warning mail was last sent.
    pub expiry_notified_at: Option<DateTime<Utc>>,
    pub blocked: bool,
    pub is_admin: bool,
    /// Whether the account exists on the XMPP server yet. False between
    /// registration and confirmation when the host reserves names.
    pub created_in_backend: bool,
    pub notify_account_expires: bool,
    pub notify_gpg_expires: bool,
}

impl User {
    pub fn new(jid: Jid, email: Option<String>, password: &str) -> Result<Self> {
        if let Some(addr) = &email {
            Self::validate_email(addr).map_err(|e| anyhow::anyhow!("Invalid email: {}", e))?;
        }

        let password_hash = Self::hash_password(password)?;
        let now = Utc::now();

        Ok(Self {
            id: None,
            jid,
            email,
            password_hash,
            gpg_fingerprint: None,
            registration_method: RegistrationMethod::Website,
            registered_at: now,
            confirmed_at: None,
            last_activity: now,
            expiry_notified_at: None,
            blocked: false,
            is_admin: false,
            created_in_backend: false,
            notify_account_expires: true,
            notify_gpg_expires: true,
        })
    }

    pub fn hash_password(password: &str) -> Result<String> {
        use argon2::password_hash::rand_core::OsRng;

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();
        Ok(hash)
    }

    pub fn set_password(&mut self, password: &str) -> Result<()> {
        self.password_hash = Self::hash_password(password)?;
        Ok(())
    }

    pub fn verify_password(&self, password: &str) -> Result<bool> {
        use argon2::password_hash::{PasswordHash, PasswordVerifier};

        let parsed = PasswordHash::new(&self.password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    /// Mark the current email address as confirmed.
    pub fn confirm(&mut self) {
        self.confirmed_at = Some(Utc::now());
    }

    /// Whether this user can receive confirmation links at all.
    pub fn has_confirmed_email(&self) -> bool {
        self.email.is_some() && self.confirmed_at.is_some()
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn validate_email(email: &str) -> Result<(), String> {
        if email.is_empty() {
            return Err("Email cannot be empty".to_string());
        }

        if email.len() > 255 {
            return Err("Email cannot exceed 255 characters".to_string());
        }

        if !EMAIL_RE.is_match(email) {
            return Err("Invalid email format".to_string());
        }

        Ok(())
    }
}
