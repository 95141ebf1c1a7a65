//! # Discord chat bot
//!
//! Channel-scoped LLM conversations on Discord. Incoming gateway messages pass through
//! the handler chain (logging, text commands, conversation); each channel owns a
//! debounced session that decides when to answer, calls the model with tools, and
//! renders replies within Discord's message limits.

pub mod activation;
pub mod chain;
pub mod cli;
pub mod commands;
pub mod components;
pub mod config;
pub mod core;
pub mod discord;
pub mod emoji;
pub mod format;
pub mod handlers;
pub mod registry;
pub mod render;
pub mod runner;
pub mod segment;
pub mod session;
pub mod tools;

pub use cli::{load_config, Cli, Commands};

pub use crate::core::{
    init_tracing, Bot, BotIdentity, Channel, ChatMode, DbotError, Handler, HandlerError,
    HandlerResponse, Message, Result, SentMessage, User,
};

pub use chain::HandlerChain;
pub use discord::{run_client, DiscordBotAdapter, DiscordEventHandler, DiscordMessageWrapper};

pub use config::{BaseConfig, BotConfig, ChatConfig};
pub use runner::run_bot;

pub use components::{build_bot_components, build_bot_components_with, build_handler_chain, BotComponents};
pub use handlers::{CommandHandler, ConversationHandler, LoggingHandler};
pub use registry::{Registry, SessionRegistry};
pub use render::{RenderJob, RenderOptions};
pub use session::{ConversationSession, PromptOptions, SessionFactory, SessionSettings};
pub use tools::{BuiltinTools, ToolExecutor};
