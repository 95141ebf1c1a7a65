//! Bot configuration: BaseConfig (Discord + log + DB) + ChatConfig (conversation
//! behaviour) + the LLM config from `llm-client`.

mod base;
mod bot_config;
mod chat;


pub use base::BaseConfig;
pub use bot_config::BotConfig;
pub use chat::ChatConfig;
