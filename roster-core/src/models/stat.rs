use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Metric names written by the web handlers. Aggregation happens outside
// this application; monitoring reads the table directly.
pub const STAT_REGISTER: &str = "register";
pub const STAT_REGISTER_CONFIRMED: &str = "register_confirmed";
pub const STAT_RESET_PASSWORD: &str = "reset_password";
pub const STAT_RESET_PASSWORD_CONFIRMED: &str = "reset_password_confirmed";
pub const STAT_SET_PASSWORD: &str = "set_password";
pub const STAT_SET_EMAIL: &str = "set_email";
pub const STAT_SET_EMAIL_CONFIRMED: &str = "set_email_confirmed";
pub const STAT_DELETE_ACCOUNT: &str = "delete_account";
pub const STAT_DELETE_ACCOUNT_CONFIRMED: &str = "delete_account_confirmed";
pub const STAT_FAILED_LOGIN: &str = "failed_login";

/// An append-only counter event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatEvent {
    pub id: Option<i64>,
    pub metric: String,
    pub value: i64,
    pub stamp: DateTime<Utc>,
}

impl StatEvent {
    pub fn new(metric: &str, value: i64) -> Self {
        Self {
            id: None,
            metric: metric.to_string(),
            value,
            stamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_event() {
        let event = StatEvent::new(STAT_REGISTER, 1);
        assert_eq!(event.metric, "register");
        assert_eq!(event.value, 1);
        assert!(event.id.is_none());
    }
}
