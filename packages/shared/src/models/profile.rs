use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Teacher profile stored at `users/{uid}`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub onboarded: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(uid: &str, display_name: &str) -> Self {
        UserProfile {
            uid: uid.to_string(),
            display_name: display_name.to_string(),
            school: String::new(),
            onboarded: false,
            created_at: Utc::now(),
        }
    }
}
