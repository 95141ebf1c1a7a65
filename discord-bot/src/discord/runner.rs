//! Gateway runner: converts serenity messages to core messages and passes them to the
//! HandlerChain; records the bot identity on ready.

use super::adapters::{DiscordMessageWrapper, GuildNames};
use crate::chain::HandlerChain;
use crate::core::BotIdentity;
use anyhow::{Context as _, Result};
use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::{GatewayIntents, Ready};
use serenity::prelude::{Client, Context, EventHandler};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, instrument};

pub struct DiscordEventHandler {
    chain: HandlerChain,
    identity: Arc<RwLock<Option<BotIdentity>>>,
}

impl DiscordEventHandler {
    pub fn new(chain: HandlerChain, identity: Arc<RwLock<Option<BotIdentity>>>) -> Self {
        Self { chain, identity }
    }
}

/// Channel and role names from the cache. The cache guard is dropped before returning.
fn guild_names(ctx: &Context, msg: &Message) -> GuildNames {
    let Some(guild) = msg.guild_id.and_then(|id| ctx.cache.guild(id)) else {
        return GuildNames::default();
    };
    GuildNames {
        channel_name: guild.channels.get(&msg.channel_id).map(|c| c.name.clone()),
        roles: msg
            .mention_roles
            .iter()
            .filter_map(|id| guild.roles.get(id).map(|r| (id.get(), r.name.clone())))
            .collect(),
    }
}

#[async_trait]
impl EventHandler for DiscordEventHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        let identity = BotIdentity {
            id: ready.user.id.get(),
            username: ready.user.name.clone(),
        };
        info!(bot_id = identity.id, username = %identity.username, "Connected to Discord");
        *self.identity.write().await = Some(identity);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let names = guild_names(&ctx, &msg);
        let core_msg = DiscordMessageWrapper(&msg).to_core(&names);

        // Run the chain in its own task so the gateway loop is never blocked
        let chain = self.chain.clone();
        tokio::spawn(async move {
            if let Err(e) = chain.handle(&core_msg).await {
                error!(
                    error = %e,
                    author_id = core_msg.author.id,
                    channel_id = core_msg.channel.id,
                    "Handler chain failed"
                );
            }
        });
    }
}

/// Connects to the gateway and runs until the client stops.
#[instrument(skip(token, handler))]
pub async fn run_client(token: &str, handler: DiscordEventHandler) -> Result<()> {
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(token, intents)
        .event_handler(handler)
        .await
        .context("Failed to create Discord client")?;

    info!("Starting Discord client");
    client.start().await.context("Discord client error")?;
    Ok(())
}
