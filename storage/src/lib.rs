//! Storage crate: persistence for the Discord bot.
//!
//! ## Modules
//!
//! - [`error`] – Storage error types
//! - [`models`] – MemoryItem, NewMemory, MemoryQuery, MemoryList, ChannelOverride
//! - [`memory_repo`] – MemoryRepository (guild memories with TTL)
//! - [`settings_repo`] – SettingsRepository (channel model/mode overrides, guild nicknames)
//! - [`sqlite_pool`] – SqlitePoolManager

mod error;
mod memory_repo;
mod models;
mod settings_repo;
mod sqlite_pool;

pub use error::{Result, StorageError};
pub use memory_repo::{MemoryRepository, DEFAULT_MEMORY_TTL_SECS};
pub use models::{ChannelOverride, MemoryItem, MemoryList, MemoryQuery, NewMemory};
pub use settings_repo::SettingsRepository;
pub use sqlite_pool::SqlitePoolManager;
