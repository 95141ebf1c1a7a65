//! Conversation mode.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a channel's conversation responds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Group chat: buffered, debounced, gated by the activation policy.
    #[default]
    Chat,
    /// Every message gets an immediate streamed answer.
    Assistant,
}

impl ChatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMode::Chat => "chat",
            ChatMode::Assistant => "assistant",
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(ChatMode::Chat),
            "assistant" => Ok(ChatMode::Assistant),
            other => Err(format!("Unknown chat mode: {}", other)),
        }
    }
}
