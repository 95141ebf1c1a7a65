use crate::components::{build_bot_components, build_handler_chain};
use crate::config::BotConfig;
use crate::core::init_tracing;
use crate::discord::{run_client, DiscordEventHandler};
use anyhow::Result;
use tracing::{info, instrument, warn};

/// Main entry: validate config, init logging, build components and the handler chain,
/// then connect to the gateway.
#[instrument(skip(config))]
pub async fn run_bot(config: BotConfig) -> Result<()> {
    config.validate()?;
    init_tracing(config.log_file())?;

    info!(
        database_url = %config.database_url(),
        model = %config.model(),
        mode = %config.chat().default_mode,
        "Initializing bot"
    );

    let components = build_bot_components(&config).await?;

    match components.memories.purge_expired().await {
        Ok(0) => {}
        Ok(n) => info!(purged = n, "Purged expired memories"),
        Err(e) => warn!(error = %e, "Failed to purge expired memories"),
    }

    let chain = build_handler_chain(&components);
    let handler = DiscordEventHandler::new(chain, components.identity.clone());

    info!("Bot started successfully");
    run_client(config.discord_token(), handler).await
}
