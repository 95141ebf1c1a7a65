//! Memory repository: guild-scoped notes with a time-to-live.
//!
//! Expired items are purged before every listing and creation.
//! External: SQLite via sqlx.

use crate::error::{Result, StorageError};
use crate::models::{MemoryItem, MemoryList, MemoryQuery, NewMemory};
use crate::sqlite_pool::SqlitePoolManager;
use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

/// Lifetime of a memory in seconds when none is requested (24h).
pub const DEFAULT_MEMORY_TTL_SECS: i64 = 86_400;

#[derive(sqlx::FromRow)]
struct MemoryRow {
    id: String,
    guild_id: i64,
    content: String,
    created_at_ms: i64,
    expires_at_ms: i64,
    author_id: Option<i64>,
    channel_id: Option<i64>,
    message_id: Option<i64>,
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

impl From<MemoryRow> for MemoryItem {
    fn from(row: MemoryRow) -> Self {
        MemoryItem {
            id: row.id,
            guild_id: row.guild_id as u64,
            content: row.content,
            created_at: from_millis(row.created_at_ms),
            expires_at: from_millis(row.expires_at_ms),
            author_id: row.author_id.map(|v| v as u64),
            channel_id: row.channel_id.map(|v| v as u64),
            message_id: row.message_id.map(|v| v as u64),
        }
    }
}

#[derive(Clone)]
pub struct MemoryRepository {
    pool_manager: SqlitePoolManager,
}

impl MemoryRepository {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool_manager = SqlitePoolManager::new(database_url).await?;
        Self::with_pool(pool_manager).await
    }

    /// Uses an existing pool (shared with other repositories).
    pub async fn with_pool(pool_manager: SqlitePoolManager) -> Result<Self> {
        let repo = Self { pool_manager };
        repo.init().await?;
        Ok(repo)
    }

    async fn init(&self) -> Result<()> {
        info!("Creating memories table if not exist");
        let pool = self.pool_manager.pool();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memories (
                id TEXT PRIMARY KEY,
                guild_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                created_at_ms INTEGER NOT NULL,
                expires_at_ms INTEGER NOT NULL,
                author_id INTEGER,
                channel_id INTEGER,
                message_id INTEGER
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_memories_guild_id ON memories(guild_id);
            CREATE INDEX IF NOT EXISTS idx_memories_expires_at ON memories(expires_at_ms);
            "#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Deletes every memory whose expiry is at or before `now`. Returns the number removed.
    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM memories WHERE expires_at_ms <= ?")
            .bind(now.timestamp_millis())
            .execute(self.pool_manager.pool())
            .await?;
        if result.rows_affected() > 0 {
            info!(removed = result.rows_affected(), "Purged expired memories");
        }
        Ok(result.rows_affected())
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        self.purge_expired_at(Utc::now()).await
    }

    /// Stores a memory for `guild_id`, stamped with `now`.
    pub async fn create_at(&self, guild_id: u64, memory: NewMemory, now: DateTime<Utc>) -> Result<MemoryItem> {
        let content = memory.content.trim();
        if content.is_empty() {
            return Err(StorageError::InvalidInput(
                "Memory content cannot be empty.".to_string(),
            ));
        }
        self.purge_expired_at(now).await?;

        let ttl = match memory.ttl_seconds {
            Some(secs) if secs > 0 => Duration::seconds(secs),
            _ => Duration::seconds(DEFAULT_MEMORY_TTL_SECS),
        };
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(6).collect();
        let item = MemoryItem {
            id: format!("{}-{}-{}", guild_id, now.timestamp_millis(), suffix),
            guild_id,
            content: content.to_string(),
            created_at: now,
            expires_at: now + ttl,
            author_id: memory.author_id,
            channel_id: memory.channel_id,
            message_id: memory.message_id,
        };

        sqlx::query(
            r#"
            INSERT INTO memories (id, guild_id, content, created_at_ms, expires_at_ms, author_id, channel_id, message_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(guild_id as i64)
        .bind(&item.content)
        .bind(item.created_at.timestamp_millis())
        .bind(item.expires_at.timestamp_millis())
        .bind(item.author_id.map(|v| v as i64))
        .bind(item.channel_id.map(|v| v as i64))
        .bind(item.message_id.map(|v| v as i64))
        .execute(self.pool_manager.pool())
        .await?;

        info!(guild_id, memory_id = %item.id, "Saved memory");
        Ok(item)
    }

    pub async fn create(&self, guild_id: u64, memory: NewMemory) -> Result<MemoryItem> {
        self.create_at(guild_id, memory, Utc::now()).await
    }

    /// Lists live memories of a guild, newest first, filtered and limited by `query`.
    pub async fn list_at(&self, guild_id: u64, query: &MemoryQuery, now: DateTime<Utc>) -> Result<MemoryList> {
        self.purge_expired_at(now).await?;

        let rows: Vec<MemoryRow> = sqlx::query_as::<_, MemoryRow>(
            "SELECT * FROM memories WHERE guild_id = ? ORDER BY created_at_ms DESC",
        )
        .bind(guild_id as i64)
        .fetch_all(self.pool_manager.pool())
        .await?;

        let needle = query
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);
        let matching: Vec<MemoryItem> = rows
            .into_iter()
            .map(MemoryItem::from)
            .filter(|item| match &needle {
                Some(n) => item.content.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .collect();

        let total = matching.len();
        let items = matching.into_iter().take(query.effective_limit()).collect();
        Ok(MemoryList { total, items })
    }

    pub async fn list(&self, guild_id: u64, query: &MemoryQuery) -> Result<MemoryList> {
        self.list_at(guild_id, query, Utc::now()).await
    }
}
