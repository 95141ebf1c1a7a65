//! Error types for the bot core.
//!
//! [`DbotError`] is the top-level error; [`HandlerError`] is used for handler failures.

use thiserror::Error;

/// Top-level error (transport, permission, model, storage, config, IO).
#[derive(Error, Debug)]
pub enum DbotError {
    #[error("Bot error: {0}")]
    Bot(String),

    /// The bot lacks a Discord permission for the operation (HTTP 403 / code 50013).
    #[error("Missing permissions: {0}")]
    Permission(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced by handlers (invalid command, state, empty content).
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Empty content")]
    EmptyContent,
}

impl From<anyhow::Error> for DbotError {
    fn from(err: anyhow::Error) -> Self {
        DbotError::Llm(format!("{:#}", err))
    }
}

/// Result type for core operations; uses [`DbotError`].
pub type Result<T> = std::result::Result<T, DbotError>;
