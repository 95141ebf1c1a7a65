//! Settings repository: per-channel model/mode overrides and per-guild nicknames.

use crate::error::Result;
use crate::models::ChannelOverride;
use crate::sqlite_pool::SqlitePoolManager;
use tracing::info;

#[derive(Clone)]
pub struct SettingsRepository {
    pool_manager: SqlitePoolManager,
}

impl SettingsRepository {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool_manager = SqlitePoolManager::new(database_url).await?;
        Self::with_pool(pool_manager).await
    }

    pub async fn with_pool(pool_manager: SqlitePoolManager) -> Result<Self> {
        let repo = Self { pool_manager };
        repo.init().await?;
        Ok(repo)
    }

    async fn init(&self) -> Result<()> {
        info!("Creating settings tables if not exist");
        let pool = self.pool_manager.pool();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channel_overrides (
                channel_id INTEGER PRIMARY KEY,
                model TEXT,
                mode TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guild_nicknames (
                guild_id INTEGER PRIMARY KEY,
                nickname TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn get_override(&self, channel_id: u64) -> Result<Option<ChannelOverride>> {
        let row: Option<(Option<String>, Option<String>)> =
            sqlx::query_as("SELECT model, mode FROM channel_overrides WHERE channel_id = ?")
                .bind(channel_id as i64)
                .fetch_optional(self.pool_manager.pool())
                .await?;
        Ok(row.map(|(model, mode)| ChannelOverride {
            channel_id,
            model,
            mode,
        }))
    }

    pub async fn set_model(&self, channel_id: u64, model: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO channel_overrides (channel_id, model) VALUES (?, ?)
            ON CONFLICT(channel_id) DO UPDATE SET model = excluded.model
            "#,
        )
        .bind(channel_id as i64)
        .bind(model)
        .execute(self.pool_manager.pool())
        .await?;
        info!(channel_id, model, "Channel model override saved");
        Ok(())
    }

    pub async fn set_mode(&self, channel_id: u64, mode: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO channel_overrides (channel_id, mode) VALUES (?, ?)
            ON CONFLICT(channel_id) DO UPDATE SET mode = excluded.mode
            "#,
        )
        .bind(channel_id as i64)
        .bind(mode)
        .execute(self.pool_manager.pool())
        .await?;
        info!(channel_id, mode, "Channel mode override saved");
        Ok(())
    }

    /// Removes both overrides of a channel. Returns whether a row existed.
    pub async fn clear_override(&self, channel_id: u64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM channel_overrides WHERE channel_id = ?")
            .bind(channel_id as i64)
            .execute(self.pool_manager.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_nickname(&self, guild_id: u64) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT nickname FROM guild_nicknames WHERE guild_id = ?")
                .bind(guild_id as i64)
                .fetch_optional(self.pool_manager.pool())
                .await?;
        Ok(row.map(|(nickname,)| nickname))
    }

    pub async fn set_nickname(&self, guild_id: u64, nickname: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO guild_nicknames (guild_id, nickname) VALUES (?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET nickname = excluded.nickname
            "#,
        )
        .bind(guild_id as i64)
        .bind(nickname)
        .execute(self.pool_manager.pool())
        .await?;
        info!(guild_id, nickname, "Guild nickname saved");
        Ok(())
    }
}
