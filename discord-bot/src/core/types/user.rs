//! User types for the core model.

use serde::{Deserialize, Serialize};

/// A Discord user as seen in a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    /// Guild nickname or global display name, when set.
    pub display_name: Option<String>,
    pub bot: bool,
}

impl User {
    /// Display name, falling back to the username.
    pub fn display(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }

    /// Mention markup `<@id>`.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// The bot's own account, recorded when the gateway session is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: u64,
    pub username: String,
}
