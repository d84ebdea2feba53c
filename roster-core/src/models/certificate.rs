use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pre-parsed metadata of a TLS certificate served by one of our hosts.
/// Parsing the PEM happens at import time; this model only stores and
/// displays the results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Certificate {
    pub id: Option<i64>,
    /// Primary hostname this certificate is served for.
    pub hostname: String,
    /// The certificate itself, PEM encoded.
    pub pem: String,
    /// All hostnames covered (subject + SANs).
    pub hostnames: Vec<String>,
    pub key_size: i64,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    /// Serial as uppercase hex, without colons.
    pub serial: String,
    pub sha256: String,
    pub sha512: String,
    /// TLSA fingerprint (sha512) published in DNS.
    pub tlsa: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Certificate {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.valid_from < now && self.valid_until > now
    }

    /// Serial in the colon-grouped form shown on certificate pages.
    pub fn serial_display(&self) -> String {
        add_colons(&self.serial)
    }
}

/// Group a hex string into byte pairs: `"BC614E"` -> `"BC:61:4E"`.
pub fn add_colons(s: &str) -> String {
    s.as_bytes()
        .chunks(2)
        .map(|c| std::str::from_utf8(c).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(":")
}

/// Even-length uppercase hex form of a numeric serial, as stored in
/// [`Certificate::serial`].
pub fn int_to_hex(value: u128) -> String {
    let mut s = format!("{:X}", value);
    if s.len() % 2 == 1 {
        s.insert(0, '0');
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn cert(valid_from: DateTime<Utc>, valid_until: DateTime<Utc>) -> Certificate {
        Certificate {
            id: None,
            hostname: "example.com".to_string(),
            pem: "-----BEGIN CERTIFICATE-----\n...".to_string(),
            hostnames: vec!["example.com".to_string(), "xmpp.example.com".to_string()],
            key_size: 4096,
            valid_from,
            valid_until,
            serial: "BC614E".to_string(),
            sha256: "AA".repeat(32),
            sha512: "BB".repeat(64),
            tlsa: "BB".repeat(64),
            enabled: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_valid_window() {
        let now = Utc::now();
        assert!(cert(now - Duration::days(1), now + Duration::days(1)).is_valid(now));
        assert!(!cert(now + Duration::days(1), now + Duration::days(2)).is_valid(now));
        assert!(!cert(now - Duration::days(2), now - Duration::days(1)).is_valid(now));
    }

    #[test]
    fn test_add_colons() {
        assert_eq!(add_colons("BC614E"), "BC:61:4E");
        assert_eq!(add_colons(""), "");
        assert_eq!(add_colons("AB"), "AB");
    }

    #[test]
    fn test_int_to_hex() {
        assert_eq!(int_to_hex(12345678), "BC614E");
        assert_eq!(int_to_hex(0), "00");
        assert_eq!(int_to_hex(255), "FF");
        assert_eq!(int_to_hex(256), "0100");
    }

    #[test]
    fn test_serial_display() {
        let now = Utc::now();
        let c = cert(now, now);
        assert_eq!(c.serial_display(), "BC:61:4E");
    }
}
