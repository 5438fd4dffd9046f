use serde::{Deserialize, Serialize};

/// Persisted auth entries. Unknown keys in the file are ignored.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_token: Option<String>,
}

impl TokenRecord {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.refresh_token.is_none() && self.guest_token.is_none()
    }
}
