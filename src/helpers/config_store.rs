use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::helpers::starboard::{Database, FilterMode, StarboardConfig};

/// In-memory view of every starboard config, keyed by guild.
///
/// Loaded in full at startup. Every mutation writes the durable store first
/// and updates the cache only once that write succeeds, so a storage failure
/// leaves memory and storage consistent and surfaces the original error.
pub struct ConfigStore {
    db: Database,
    cache: RwLock<HashMap<u64, Vec<StarboardConfig>>>,
}

impl ConfigStore {
    pub async fn load(db: Database) -> Result<Self, sqlx::Error> {
        let mut cache: HashMap<u64, Vec<StarboardConfig>> = HashMap::new();
        for config in db.list_configs().await? {
            cache.entry(config.guild_id).or_default().push(config);
        }
        tracing::debug!(
            guilds = cache.len(),
            "loaded starboard configs"
        );
        Ok(Self {
            db,
            cache: RwLock::new(cache),
        })
    }

    pub async fn for_guild(&self, guild_id: u64) -> Vec<StarboardConfig> {
        self.cache
            .read()
            .await
            .get(&guild_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Lookup across guilds. Events like reactions-cleared carry no guild id,
    /// so the engine resolves configs from post records by id.
    pub async fn by_id(&self, config_id: i64) -> Option<StarboardConfig> {
        self.cache
            .read()
            .await
            .values()
            .flatten()
            .find(|c| c.id == config_id)
            .cloned()
    }

    pub async fn create(
        &self,
        guild_id: u64,
        target_channel_id: u64,
        emote: String,
        threshold: i64,
    ) -> Result<i64, sqlx::Error> {
        let mut config = StarboardConfig::new(guild_id, target_channel_id, emote, threshold);
        config.id = self.db.insert_config(&config).await?;
        let id = config.id;

        self.cache
            .write()
            .await
            .entry(guild_id)
            .or_default()
            .push(config);
        Ok(id)
    }

    /// Returns false when the guild owns no config with that id.
    pub async fn delete(&self, guild_id: u64, config_id: i64) -> Result<bool, sqlx::Error> {
        {
            let cache = self.cache.read().await;
            let owned = cache
                .get(&guild_id)
                .is_some_and(|configs| configs.iter().any(|c| c.id == config_id));
            if !owned {
                return Ok(false);
            }
        }

        self.db.delete_config(config_id).await?;

        let mut cache = self.cache.write().await;
        if let Some(configs) = cache.get_mut(&guild_id) {
            configs.retain(|c| c.id != config_id);
        }
        Ok(true)
    }

    /// Apply a mutation to one config: copy, mutate, persist, then commit to
    /// the cache. Returns false for an unknown (guild, config) pair.
    pub async fn update<F>(
        &self,
        guild_id: u64,
        config_id: i64,
        mutate: F,
    ) -> Result<bool, sqlx::Error>
    where
        F: FnOnce(&mut StarboardConfig),
    {
        let mut updated = {
            let cache = self.cache.read().await;
            match cache
                .get(&guild_id)
                .and_then(|configs| configs.iter().find(|c| c.id == config_id))
            {
                Some(config) => config.clone(),
                None => return Ok(false),
            }
        };
        mutate(&mut updated);

        self.db.update_config(&updated).await?;

        let mut cache = self.cache.write().await;
        if let Some(slot) = cache
            .get_mut(&guild_id)
            .and_then(|configs| configs.iter_mut().find(|c| c.id == config_id))
        {
            *slot = updated;
        }
        Ok(true)
    }

    /// Add or remove a channel in the config's filter list. Returns the new
    /// membership state, or None for an unknown pair.
    pub async fn toggle_channel(
        &self,
        guild_id: u64,
        config_id: i64,
        channel_id: u64,
    ) -> Result<Option<bool>, sqlx::Error> {
        let currently_listed = {
            let cache = self.cache.read().await;
            match cache
                .get(&guild_id)
                .and_then(|configs| configs.iter().find(|c| c.id == config_id))
            {
                Some(config) => config.filter_channels.contains(&channel_id),
                None => return Ok(None),
            }
        };

        if currently_listed {
            self.db.remove_filter_channel(config_id, channel_id).await?;
        } else {
            self.db.add_filter_channel(config_id, channel_id).await?;
        }

        let mut cache = self.cache.write().await;
        if let Some(config) = cache
            .get_mut(&guild_id)
            .and_then(|configs| configs.iter_mut().find(|c| c.id == config_id))
        {
            if currently_listed {
                config.filter_channels.remove(&channel_id);
            } else {
                config.filter_channels.insert(channel_id);
            }
        }
        Ok(Some(!currently_listed))
    }

    pub async fn set_filter_mode(
        &self,
        guild_id: u64,
        config_id: i64,
        mode: FilterMode,
    ) -> Result<bool, sqlx::Error> {
        self.update(guild_id, config_id, |c| c.filter_mode = mode)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::helpers::starboard::tests::memory_db;

    async fn store() -> ConfigStore {
        ConfigStore::load(memory_db().await).await.unwrap()
    }

    #[tokio::test]
    async fn create_then_list_per_guild() {
        let store = store().await;
        let a = store.create(1, 10, "⭐".to_string(), 2).await.unwrap();
        let b = store.create(1, 11, "🔥".to_string(), 5).await.unwrap();
        store.create(2, 12, "⭐".to_string(), 1).await.unwrap();

        let configs = store.for_guild(1).await;
        assert_eq!(configs.len(), 2);
        assert!(configs.iter().any(|c| c.id == a && c.threshold == 2));
        assert!(configs.iter().any(|c| c.id == b && c.emote == "🔥"));
        assert_eq!(store.for_guild(2).await.len(), 1);
        assert!(store.for_guild(3).await.is_empty());
    }

    #[tokio::test]
    async fn update_rejects_foreign_guild() {
        let store = store().await;
        let id = store.create(1, 10, "⭐".to_string(), 2).await.unwrap();

        // guild 2 does not own this config
        let changed = store.update(2, id, |c| c.threshold = 99).await.unwrap();
        assert!(!changed);
        assert_eq!(store.for_guild(1).await[0].threshold, 2);

        let changed = store.update(1, id, |c| c.threshold = 4).await.unwrap();
        assert!(changed);
        assert_eq!(store.for_guild(1).await[0].threshold, 4);
    }

    #[tokio::test]
    async fn toggle_channel_flips_membership() {
        let store = store().await;
        let id = store.create(1, 10, "⭐".to_string(), 2).await.unwrap();

        assert_eq!(store.toggle_channel(1, id, 77).await.unwrap(), Some(true));
        assert!(store.for_guild(1).await[0].filter_channels.contains(&77));
        assert_eq!(store.toggle_channel(1, id, 77).await.unwrap(), Some(false));
        assert!(store.for_guild(1).await[0].filter_channels.is_empty());
        assert_eq!(store.toggle_channel(1, 999, 77).await.unwrap(), None);
    }

    #[tokio::test]
    async fn cache_survives_reload() {
        let db = memory_db().await;
        let store = ConfigStore::load(db.clone()).await.unwrap();
        store.create(1, 10, "⭐".to_string(), 3).await.unwrap();

        // a fresh store over the same pool sees the persisted config
        let reloaded = ConfigStore::load(db).await.unwrap();
        assert_eq!(reloaded.for_guild(1).await.len(), 1);
    }
}
