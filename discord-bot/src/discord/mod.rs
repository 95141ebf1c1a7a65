//! Discord framework layer: message conversion, Bot implementation over serenity
//! HTTP, gateway event handler and client runner.

mod adapters;
mod bot_adapter;
mod rest;
mod runner;

pub use adapters::{pick_display_name, DiscordMessageWrapper, DiscordUserWrapper, GuildNames};
pub use bot_adapter::DiscordBotAdapter;
pub use rest::DiscordRest;
pub use runner::{run_client, DiscordEventHandler};
