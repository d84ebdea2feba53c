use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of a user's activity log, shown on the account page. Entries
/// are pruned after a retention window by the housekeeping sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserLogEntry {
    pub id: Option<i64>,
    pub user_id: i64,
    /// Client address the activity originated from.
    pub address: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl UserLogEntry {
    pub fn new(user_id: i64, address: &str, message: &str) -> Self {
        Self {
            id: None,
            user_id,
            address: address.to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
        }
    }
}
