use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static FINGERPRINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-F]{40}$").expect("Failed to compile fingerprint regex"));

/// A GPG public key registered for encrypting notification mail. The key
/// material is opaque to us; actual encryption happens in the mailer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GpgKey {
    pub id: Option<i64>,
    pub user_id: i64,
    /// Normalized: 40 uppercase hex characters, no spaces, no 0x prefix.
    pub fingerprint: String,
    /// ASCII-armored key block, as submitted.
    pub key: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl GpgKey {
    pub fn new(user_id: i64, fingerprint: &str, key: &str) -> Result<Self, String> {
        let fingerprint = normalize_fingerprint(fingerprint)?;

        Ok(Self {
            id: None,
            user_id,
            fingerprint,
            key: key.to_string(),
            expires_at: None,
            created_at: Utc::now(),
        })
    }

    /// Usable for encrypting outgoing mail right now?
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => expires >= now,
            None => true,
        }
    }
}

/// Normalize a user-supplied fingerprint: strip whitespace and an optional
/// `0x` prefix, uppercase, and require the full 160-bit form.
pub fn normalize_fingerprint(value: &str) -> Result<String, String> {
    let mut cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if let Some(stripped) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        cleaned = stripped.to_string();
    }
    let cleaned = cleaned.to_uppercase();

    if !FINGERPRINT_RE.is_match(&cleaned) {
        return Err("Fingerprint must be 40 hexadecimal characters".to_string());
    }

    Ok(cleaned)
}
