use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Display name recorded when the profile lookup fails.
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown user";

/// Per-user profile record kept in the user table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub display_name: String,
    #[serde(alias = "first_message_time", deserialize_with = "timestamp")]
    pub first_seen: DateTime<Utc>,
    #[serde(alias = "last_message_time", deserialize_with = "timestamp")]
    pub last_seen: DateTime<Utc>,
    pub message_count: u64,
    #[serde(default)]
    pub blocked: bool,
}

impl UserRecord {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            first_seen: now,
            last_seen: now,
            message_count: 1,
            blocked: false,
        }
    }

    /// Record one more message from this user.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_seen = now;
        self.message_count += 1;
    }
}

/// RFC 3339, or an offset-less ISO 8601 value from older tables, read as UTC.
fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
}

/// `user_id -> UserRecord`, serialized as a JSON object.
pub type UserTable = HashMap<String, UserRecord>;

/// Subset of the LINE profile the bot uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub display_name: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// An image written to the upload directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub filename: String,
    pub content_id: String,
    pub size_bytes: usize,
}
