//! Per-channel model/mode override.
//!
//! Maps to the `channel_overrides` table. `mode` is stored as the mode's lowercase
//! name; the bot crate parses it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOverride {
    pub channel_id: u64,
    pub model: Option<String>,
    pub mode: Option<String>,
}
