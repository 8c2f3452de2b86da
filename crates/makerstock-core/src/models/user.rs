use serde::{Deserialize, Serialize};

/// Whether a user is currently checked in at the makerspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct UserStatus {
    pub active: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar: String,
}

impl UserStatus {
    /// Name to greet the user with, falling back to their id.
    pub fn display_name<'a>(&'a self, user_id: &'a str) -> &'a str {
        if self.name.trim().is_empty() {
            user_id
        } else {
            &self.name
        }
    }
}
