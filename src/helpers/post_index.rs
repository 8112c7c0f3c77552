use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::helpers::starboard::{AggregatePost, Database};

/// In-memory map from (source message, config) to the aggregate post
/// mirroring it. Same discipline as `ConfigStore`: full load at startup,
/// durable store written before the cache on every mutation.
pub struct PostIndex {
    db: Database,
    cache: RwLock<HashMap<(u64, i64), AggregatePost>>,
}

impl PostIndex {
    pub async fn load(db: Database) -> Result<Self, sqlx::Error> {
        let mut cache = HashMap::new();
        for post in db.list_posts().await? {
            cache.insert((post.source_message_id, post.config_id), post);
        }
        tracing::debug!(posts = cache.len(), "loaded aggregate post index");
        Ok(Self {
            db,
            cache: RwLock::new(cache),
        })
    }

    pub async fn get(&self, source_message_id: u64, config_id: i64) -> Option<AggregatePost> {
        self.cache
            .read()
            .await
            .get(&(source_message_id, config_id))
            .cloned()
    }

    /// Every post mirroring a source message, across all configs. Used by
    /// the cleared/deleted events, which arrive without a guild id.
    pub async fn for_message(&self, source_message_id: u64) -> Vec<AggregatePost> {
        self.cache
            .read()
            .await
            .values()
            .filter(|post| post.source_message_id == source_message_id)
            .cloned()
            .collect()
    }

    /// Insert or overwrite the entry for the post's (source, config) pair.
    pub async fn put(&self, post: AggregatePost) -> Result<(), sqlx::Error> {
        self.db.upsert_post(&post).await?;
        self.cache
            .write()
            .await
            .insert((post.source_message_id, post.config_id), post);
        Ok(())
    }

    pub async fn remove(&self, source_message_id: u64, config_id: i64) -> Result<(), sqlx::Error> {
        self.db.delete_post(source_message_id, config_id).await?;
        self.cache
            .write()
            .await
            .remove(&(source_message_id, config_id));
        Ok(())
    }

    /// Cascade used when a config is deleted.
    pub async fn remove_for_config(&self, config_id: i64) -> Result<(), sqlx::Error> {
        self.db.delete_posts_for_config(config_id).await?;
        self.cache
            .write()
            .await
            .retain(|_, post| post.config_id != config_id);
        Ok(())
    }
}
