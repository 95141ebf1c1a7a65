//! Channel type for the core model.

use serde::{Deserialize, Serialize};

/// A text channel (guild channel or DM).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: u64,
    /// `None` for direct messages.
    pub guild_id: Option<u64>,
    pub name: Option<String>,
}
