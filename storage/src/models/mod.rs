//! Data models for persistence.

mod channel_override;
mod memory_item;

pub use channel_override::ChannelOverride;
pub use memory_item::{MemoryItem, MemoryList, MemoryQuery, NewMemory};
