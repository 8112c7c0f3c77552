use std::collections::HashSet;

use sqlx::sqlite::SqlitePool;
use sqlx::Row;

pub(crate) use crate::structs::starboard_message::{AggregatePost, FilterMode, StarboardConfig};

/// Durable store for starboard configs and aggregate posts.
///
/// Pure CRUD over sqlite; the in-memory view lives in `ConfigStore` and
/// `PostIndex`, which call down here before touching their caches.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePool::connect(database_url).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS starboard_configs (
                id INTEGER PRIMARY KEY,
                guild_id INTEGER NOT NULL,
                target_channel_id INTEGER NOT NULL,
                emote TEXT NOT NULL,
                threshold INTEGER NOT NULL DEFAULT 1,
                filter_mode TEXT NOT NULL DEFAULT 'blacklist',
                allow_bot_authors BOOLEAN NOT NULL DEFAULT FALSE,
                remove_on_delete BOOLEAN NOT NULL DEFAULT TRUE,
                remove_on_clear BOOLEAN NOT NULL DEFAULT TRUE,
                remove_on_below_threshold BOOLEAN NOT NULL DEFAULT FALSE,
                repost_after INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS starboard_filter_channels (
                config_id INTEGER NOT NULL,
                channel_id INTEGER NOT NULL,
                UNIQUE(config_id, channel_id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS starboard_posts (
                source_message_id INTEGER NOT NULL,
                config_id INTEGER NOT NULL,
                post_channel_id INTEGER NOT NULL,
                post_message_id INTEGER NOT NULL,
                UNIQUE(source_message_id, config_id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub async fn list_configs(&self) -> Result<Vec<StarboardConfig>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM starboard_configs")
            .fetch_all(&self.pool)
            .await?;

        let mut configs = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let mode_str: String = row.try_get("filter_mode")?;
            let filter_mode = FilterMode::parse(&mode_str).ok_or_else(|| {
                sqlx::Error::Decode(format!("bad filter_mode '{mode_str}'").into())
            })?;

            configs.push(StarboardConfig {
                id,
                guild_id: row.try_get::<i64, _>("guild_id")? as u64,
                target_channel_id: row.try_get::<i64, _>("target_channel_id")? as u64,
                emote: row.try_get("emote")?,
                threshold: row.try_get("threshold")?,
                filter_mode,
                filter_channels: self.filter_channels(id).await?,
                allow_bot_authors: row.try_get("allow_bot_authors")?,
                remove_on_delete: row.try_get("remove_on_delete")?,
                remove_on_clear: row.try_get("remove_on_clear")?,
                remove_on_below_threshold: row.try_get("remove_on_below_threshold")?,
                repost_after: row.try_get("repost_after")?,
            });
        }

        Ok(configs)
    }

    async fn filter_channels(&self, config_id: i64) -> Result<HashSet<u64>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT channel_id FROM starboard_filter_channels WHERE config_id = ?",
        )
        .bind(config_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<i64, _>("channel_id").map(|id| id as u64))
            .collect()
    }

    pub async fn insert_config(&self, config: &StarboardConfig) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"INSERT INTO starboard_configs
               (guild_id, target_channel_id, emote, threshold, filter_mode,
                allow_bot_authors, remove_on_delete, remove_on_clear,
                remove_on_below_threshold, repost_after)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(config.guild_id as i64)
        .bind(config.target_channel_id as i64)
        .bind(&config.emote)
        .bind(config.threshold)
        .bind(config.filter_mode.as_str())
        .bind(config.allow_bot_authors)
        .bind(config.remove_on_delete)
        .bind(config.remove_on_clear)
        .bind(config.remove_on_below_threshold)
        .bind(config.repost_after)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn update_config(&self, config: &StarboardConfig) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"UPDATE starboard_configs SET
               target_channel_id = ?, emote = ?, threshold = ?, filter_mode = ?,
               allow_bot_authors = ?, remove_on_delete = ?, remove_on_clear = ?,
               remove_on_below_threshold = ?, repost_after = ?
               WHERE id = ?"#,
        )
        .bind(config.target_channel_id as i64)
        .bind(&config.emote)
        .bind(config.threshold)
        .bind(config.filter_mode.as_str())
        .bind(config.allow_bot_authors)
        .bind(config.remove_on_delete)
        .bind(config.remove_on_clear)
        .bind(config.remove_on_below_threshold)
        .bind(config.repost_after)
        .bind(config.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_config(&self, config_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM starboard_configs WHERE id = ?")
            .bind(config_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM starboard_filter_channels WHERE config_id = ?")
            .bind(config_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_filter_channel(
        &self,
        config_id: i64,
        channel_id: u64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT OR IGNORE INTO starboard_filter_channels (config_id, channel_id) VALUES (?, ?)",
        )
        .bind(config_id)
        .bind(channel_id as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_filter_channel(
        &self,
        config_id: i64,
        channel_id: u64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "DELETE FROM starboard_filter_channels WHERE config_id = ? AND channel_id = ?",
        )
        .bind(config_id)
        .bind(channel_id as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_posts(&self) -> Result<Vec<AggregatePost>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM starboard_posts")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(AggregatePost {
                    source_message_id: row.try_get::<i64, _>("source_message_id")? as u64,
                    config_id: row.try_get("config_id")?,
                    post_channel_id: row.try_get::<i64, _>("post_channel_id")? as u64,
                    post_message_id: row.try_get::<i64, _>("post_message_id")? as u64,
                })
            })
            .collect()
    }

    /// Insert or overwrite the post for a (source, config) pair. Overwrite
    /// happens on repost, when a fresh message replaces a buried one.
    pub async fn upsert_post(&self, post: &AggregatePost) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT OR REPLACE INTO starboard_posts
               (source_message_id, config_id, post_channel_id, post_message_id)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(post.source_message_id as i64)
        .bind(post.config_id)
        .bind(post.post_channel_id as i64)
        .bind(post.post_message_id as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_post(
        &self,
        source_message_id: u64,
        config_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "DELETE FROM starboard_posts WHERE source_message_id = ? AND config_id = ?",
        )
        .bind(source_message_id as i64)
        .bind(config_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_posts_for_config(&self, config_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM starboard_posts WHERE config_id = ?")
            .bind(config_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    // one connection: every pooled connection to sqlite::memory: is a
    // separate empty database
    pub(crate) async fn memory_db() -> Database {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        Database::from_pool(pool).await.unwrap()
    }

    #[tokio::test]
    async fn config_round_trips_through_sqlite() {
        let db = memory_db().await;

        let mut config = StarboardConfig::new(10, 20, "⭐".to_string(), 3);
        config.repost_after = 5;
        let id = db.insert_config(&config).await.unwrap();
        db.add_filter_channel(id, 30).await.unwrap();

        let configs = db.list_configs().await.unwrap();
        assert_eq!(configs.len(), 1);
        let loaded = &configs[0];
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.guild_id, 10);
        assert_eq!(loaded.target_channel_id, 20);
        assert_eq!(loaded.emote, "⭐");
        assert_eq!(loaded.threshold, 3);
        assert_eq!(loaded.repost_after, 5);
        assert_eq!(loaded.filter_mode, FilterMode::Blacklist);
        assert!(loaded.filter_channels.contains(&30));
    }

    #[tokio::test]
    async fn deleting_a_config_drops_its_filter_channels() {
        let db = memory_db().await;
        let id = db
            .insert_config(&StarboardConfig::new(1, 2, "⭐".to_string(), 1))
            .await
            .unwrap();
        db.add_filter_channel(id, 99).await.unwrap();

        db.delete_config(id).await.unwrap();
        assert!(db.list_configs().await.unwrap().is_empty());
        assert!(db.filter_channels(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_post_overwrites_existing_pair() {
        let db = memory_db().await;

        let mut post = AggregatePost {
            source_message_id: 111,
            config_id: 1,
            post_channel_id: 20,
            post_message_id: 500,
        };
        db.upsert_post(&post).await.unwrap();

        post.post_message_id = 501;
        db.upsert_post(&post).await.unwrap();

        let posts = db.list_posts().await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].post_message_id, 501);
    }
}
