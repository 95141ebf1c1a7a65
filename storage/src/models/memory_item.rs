//! Guild memory models.
//!
//! A memory is a short note the bot keeps for a guild until it expires.
//! Serialized in camelCase since it is handed to the model as tool output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryItem {
    /// `{guild_id}-{unix_ms}-{6 random chars}`.
    pub id: String,
    pub guild_id: u64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub author_id: Option<u64>,
    pub channel_id: Option<u64>,
    pub message_id: Option<u64>,
}

impl MemoryItem {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Input for creating a memory. Content is trimmed; empty content is rejected.
#[derive(Debug, Clone, Default)]
pub struct NewMemory {
    pub content: String,
    /// Lifetime in seconds; `None` or non-positive uses the default TTL.
    pub ttl_seconds: Option<i64>,
    pub author_id: Option<u64>,
    pub channel_id: Option<u64>,
    pub message_id: Option<u64>,
}

/// Listing filter. `limit` is clamped to 1..=100, default 20.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryQuery {
    /// Case-insensitive substring match on content.
    pub query: Option<String>,
    pub limit: Option<i64>,
}

impl MemoryQuery {
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(20).clamp(1, 100) as usize
    }
}

/// Result of a listing: total matches before the limit, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryList {
    pub total: usize,
    pub items: Vec<MemoryItem>,
}
