use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque authenticated identity. Only `user_id` matters to the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn(String),
    SignedOut,
    TokenRefreshed(Session),
}
