use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub is_admin: bool,
}

fn default_active() -> bool {
    true
}

impl UserProfile {
    pub fn role_display(&self) -> &'static str {
        if self.is_admin {
            "Administrator"
        } else {
            "Candidate"
        }
    }
}
