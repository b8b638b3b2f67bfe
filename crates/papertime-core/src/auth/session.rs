use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The persisted signed-in state: the credential pair plus the profile bits
/// the UI needs (username, admin flag).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub access_token: String,
    /// Absent when the server issued only an access token at login.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    pub issued_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        username: Option<String>,
        is_admin: bool,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            username,
            is_admin,
            issued_at: Utc::now(),
        }
    }

    /// Copy of this session carrying a freshly issued credential pair.
    /// A renewal response without a new renewal token keeps the old one.
    pub fn renewed(&self, access_token: String, refresh_token: Option<String>) -> Self {
        Self {
            access_token,
            refresh_token: refresh_token.or_else(|| self.refresh_token.clone()),
            username: self.username.clone(),
            is_admin: self.is_admin,
            issued_at: Utc::now(),
        }
    }

    pub fn can_renew(&self) -> bool {
        self.refresh_token
            .as_deref()
            .map(|t| !t.is_empty())
            .unwrap_or(false)
    }
}

// Tokens never end up in logs.
impl fmt::Debug for SessionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionData")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("username", &self.username)
            .field("is_admin", &self.is_admin)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}
