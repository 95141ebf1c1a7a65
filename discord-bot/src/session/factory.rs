//! Lazily creates channel sessions from the configured defaults and persisted
//! overrides.

use super::{ConversationSession, SessionDeps, SessionSettings};
use crate::core::{BotIdentity, Channel, ChatMode};
use crate::registry::SessionRegistry;
use prompt::InstructionBuilder;
use std::sync::Arc;
use storage::SettingsRepository;
use tracing::{info, warn};

pub struct SessionFactory {
    /// Defaults; `instructions` holds the unrendered template.
    defaults: SessionSettings,
    default_nickname: String,
    deps: SessionDeps,
    settings_repo: Option<SettingsRepository>,
    registry: Arc<SessionRegistry>,
}

impl SessionFactory {
    pub fn new(
        defaults: SessionSettings,
        default_nickname: impl Into<String>,
        deps: SessionDeps,
        settings_repo: Option<SettingsRepository>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            defaults,
            default_nickname: default_nickname.into(),
            deps,
            settings_repo,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn settings_repo(&self) -> Option<&SettingsRepository> {
        self.settings_repo.as_ref()
    }

    /// Existing session of the channel, or a new one registered under its id.
    pub async fn get_or_create(&self, channel: &Channel, identity: &BotIdentity) -> Arc<ConversationSession> {
        if let Some(session) = self.registry.get(channel.id) {
            return session;
        }
        let session = self.build(channel, identity).await;
        self.registry.get_or_insert(channel.id, session)
    }

    /// Builds a session without registering it. Storage failures fall back to defaults.
    pub async fn build(&self, channel: &Channel, identity: &BotIdentity) -> ConversationSession {
        let mut settings = self.defaults.clone();
        let mut nickname = self.default_nickname.clone();

        if let Some(repo) = &self.settings_repo {
            match repo.get_override(channel.id).await {
                Ok(Some(ov)) => {
                    if let Some(model) = ov.model {
                        settings.model = model;
                    }
                    if let Some(mode) = ov.mode {
                        match mode.parse::<ChatMode>() {
                            Ok(mode) => settings.mode = mode,
                            Err(e) => warn!(channel_id = channel.id, error = %e, "Ignoring stored mode"),
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(channel_id = channel.id, error = %e, "Failed to load channel override"),
            }
            if let Some(guild_id) = channel.guild_id {
                match repo.get_nickname(guild_id).await {
                    Ok(Some(nick)) => nickname = nick,
                    Ok(None) => {}
                    Err(e) => warn!(guild_id, error = %e, "Failed to load guild nickname"),
                }
            }
        }

        settings.instructions = InstructionBuilder::new(settings.instructions.clone())
            .username(identity.username.clone())
            .nickname(nickname)
            .emojis(self.deps.emojis.names())
            .build();

        info!(
            channel_id = channel.id,
            model = %settings.model,
            mode = %settings.mode,
            "Created conversation session"
        );
        ConversationSession::new(channel.clone(), identity.id, settings, self.deps.clone())
    }
}
