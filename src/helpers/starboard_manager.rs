use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::helpers::client::{MessageClient, PostContent, SourceMessage};
use crate::helpers::config_store::ConfigStore;
use crate::helpers::content::{self, ExtractedContent};
use crate::helpers::eligibility;
use crate::helpers::error::EngineError;
use crate::helpers::post_index::PostIndex;
use crate::helpers::starboard::{AggregatePost, Database, FilterMode, StarboardConfig};
use crate::helpers::threshold;

/// The multi-starboard engine: four reactive entry points driven by the
/// gateway, a per-(source, config) create/refresh/repost/remove state
/// machine, and the admin CRUD surface the command layer calls into.
///
/// Purely reactive — no timers, no polling. Each entry point is invoked
/// concurrently by the host dispatcher; the keyed locks below serialise
/// work on one (source message, config) pair so two simultaneous events
/// cannot both observe "no post yet" and both send one.
pub struct Starboard {
    configs: ConfigStore,
    posts: PostIndex,
    locks: Mutex<HashMap<(u64, i64), Arc<Mutex<()>>>>,
}

impl Starboard {
    pub async fn new(db: Database) -> Result<Self, sqlx::Error> {
        let configs = ConfigStore::load(db.clone()).await?;
        let posts = PostIndex::load(db).await?;
        Ok(Self {
            configs,
            posts,
            locks: Mutex::new(HashMap::new()),
        })
    }

    async fn lock_for(&self, source_message_id: u64, config_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry((source_message_id, config_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ---- event entry points ------------------------------------------------

    pub async fn reaction_added<C: MessageClient>(
        &self,
        client: &C,
        guild_id: u64,
        channel_id: u64,
        message_id: u64,
        emote: &str,
    ) -> Result<(), EngineError> {
        self.reevaluate(client, guild_id, channel_id, message_id, emote)
            .await
    }

    /// Removal runs the same full re-evaluation as addition: the count is
    /// recomputed from the live reaction list either way.
    pub async fn reaction_removed<C: MessageClient>(
        &self,
        client: &C,
        guild_id: u64,
        channel_id: u64,
        message_id: u64,
        emote: &str,
    ) -> Result<(), EngineError> {
        self.reevaluate(client, guild_id, channel_id, message_id, emote)
            .await
    }

    pub async fn reactions_cleared<C: MessageClient>(
        &self,
        client: &C,
        channel_id: u64,
        message_id: u64,
    ) -> Result<(), EngineError> {
        tracing::debug!(channel_id, message_id, "reactions cleared");
        self.remove_where(client, message_id, |config| config.remove_on_clear)
            .await
    }

    pub async fn source_deleted<C: MessageClient>(
        &self,
        client: &C,
        channel_id: u64,
        message_id: u64,
    ) -> Result<(), EngineError> {
        tracing::debug!(channel_id, message_id, "source message deleted");
        self.remove_where(client, message_id, |config| config.remove_on_delete)
            .await
    }

    // ---- state machine -----------------------------------------------------

    async fn reevaluate<C: MessageClient>(
        &self,
        client: &C,
        guild_id: u64,
        channel_id: u64,
        message_id: u64,
        emote: &str,
    ) -> Result<(), EngineError> {
        let configs: Vec<StarboardConfig> = self
            .configs
            .for_guild(guild_id)
            .await
            .into_iter()
            .filter(|config| config.emote == emote)
            .collect();
        if configs.is_empty() {
            return Ok(());
        }

        let Some(message) = client.fetch_message(channel_id, message_id).await? else {
            // source vanished between the event and our fetch
            return Ok(());
        };
        let Some(extracted) = content::extract(&message) else {
            // nothing displayable; ineligible for every config
            return Ok(());
        };

        // one config failing must not starve its siblings; the first real
        // error is reported once all configs had their turn
        let mut first_error = None;
        for config in &configs {
            if let Err(err) = self.apply(client, config, &message, &extracted).await {
                match err {
                    EngineError::ChannelUnavailable(_) => {
                        tracing::debug!(config_id = config.id, %err, "skipping config");
                    }
                    err => {
                        tracing::warn!(config_id = config.id, %err, "config processing failed");
                        first_error.get_or_insert(err);
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// The decide-and-act sequence for one (message, config) pair, run
    /// entirely under that pair's lock.
    async fn apply<C: MessageClient>(
        &self,
        client: &C,
        config: &StarboardConfig,
        message: &SourceMessage,
        extracted: &ExtractedContent,
    ) -> Result<(), EngineError> {
        if !eligibility::passes_filters(message, config) {
            return Ok(());
        }
        if !client.can_post(config.target_channel_id).await {
            tracing::debug!(
                config_id = config.id,
                channel_id = config.target_channel_id,
                "cannot send in target channel, skipping"
            );
            return Ok(());
        }

        let lock = self.lock_for(message.id, config.id).await;
        let _guard = lock.lock().await;

        let count =
            threshold::star_count(client, message.channel_id, message.id, &config.emote).await?;

        match self.posts.get(message.id, config.id).await {
            None => {
                if !threshold::meets_threshold(count, config) {
                    return Ok(());
                }
                let post = compose_post(config, message, extracted, count);
                let post_message_id =
                    client.send_post(config.target_channel_id, &post).await?;
                self.posts
                    .put(AggregatePost {
                        source_message_id: message.id,
                        config_id: config.id,
                        post_channel_id: config.target_channel_id,
                        post_message_id,
                    })
                    .await?;
                tracing::debug!(
                    config_id = config.id,
                    source = message.id,
                    post = post_message_id,
                    count,
                    "aggregate post created"
                );
            }
            Some(entry) => {
                if threshold::meets_threshold(count, config) {
                    self.refresh(client, config, message, extracted, count, &entry)
                        .await?;
                } else if config.remove_on_below_threshold {
                    if let Err(err) = client
                        .delete_post(entry.post_channel_id, entry.post_message_id)
                        .await
                    {
                        tracing::debug!(%err, "aggregate post already gone");
                    }
                    self.posts.remove(message.id, config.id).await?;
                } else {
                    // the post stays, but its header should show the lower count
                    let post = compose_post(config, message, extracted, count);
                    if let Err(err) = client
                        .edit_post(entry.post_channel_id, entry.post_message_id, &post)
                        .await
                    {
                        tracing::debug!(%err, "below-threshold refresh failed");
                    }
                }
            }
        }
        Ok(())
    }

    /// Posted → Posted: edit in place, or repost when buried / externally
    /// deleted, overwriting the stored reference.
    async fn refresh<C: MessageClient>(
        &self,
        client: &C,
        config: &StarboardConfig,
        message: &SourceMessage,
        extracted: &ExtractedContent,
        count: i64,
        entry: &AggregatePost,
    ) -> Result<(), EngineError> {
        let post = compose_post(config, message, extracted, count);

        if config.repost_after == 0 {
            if client
                .fetch_message(entry.post_channel_id, entry.post_message_id)
                .await?
                .is_some()
            {
                client
                    .edit_post(entry.post_channel_id, entry.post_message_id, &post)
                    .await?;
            } else {
                // someone deleted the post out from under us; start over
                self.send_and_reindex(client, config, message, &post).await?;
            }
            return Ok(());
        }

        let depth = config.repost_after.clamp(1, 100) as u8;
        let recent = client
            .recent_message_ids(config.target_channel_id, depth)
            .await?;
        if recent.contains(&entry.post_message_id) {
            client
                .edit_post(entry.post_channel_id, entry.post_message_id, &post)
                .await?;
        } else {
            // buried past the repost window: the old post is left where it
            // is and a fresh one takes over the stored reference
            self.send_and_reindex(client, config, message, &post).await?;
        }
        Ok(())
    }

    async fn send_and_reindex<C: MessageClient>(
        &self,
        client: &C,
        config: &StarboardConfig,
        message: &SourceMessage,
        post: &PostContent,
    ) -> Result<(), EngineError> {
        let post_message_id = client.send_post(config.target_channel_id, post).await?;
        self.posts
            .put(AggregatePost {
                source_message_id: message.id,
                config_id: config.id,
                post_channel_id: config.target_channel_id,
                post_message_id,
            })
            .await?;
        Ok(())
    }

    /// Posted → NoPost for every config whose removal policy matches:
    /// best-effort delete of the aggregate message, then the index entry
    /// goes unconditionally.
    async fn remove_where<C, F>(
        &self,
        client: &C,
        message_id: u64,
        should_remove: F,
    ) -> Result<(), EngineError>
    where
        C: MessageClient,
        F: Fn(&StarboardConfig) -> bool,
    {
        for stale in self.posts.for_message(message_id).await {
            let Some(config) = self.configs.by_id(stale.config_id).await else {
                continue;
            };
            if !should_remove(&config) {
                continue;
            }

            let lock = self.lock_for(message_id, config.id).await;
            let _guard = lock.lock().await;
            let Some(entry) = self.posts.get(message_id, config.id).await else {
                continue;
            };

            if let Err(err) = client
                .delete_post(entry.post_channel_id, entry.post_message_id)
                .await
            {
                tracing::debug!(%err, "aggregate post already gone");
            }
            self.posts.remove(message_id, config.id).await?;
        }
        Ok(())
    }

    // ---- admin surface -----------------------------------------------------

    pub async fn create_starboard(
        &self,
        guild_id: u64,
        target_channel_id: u64,
        emote: String,
        threshold: i64,
    ) -> Result<i64, EngineError> {
        let threshold = threshold.max(1);
        Ok(self
            .configs
            .create(guild_id, target_channel_id, emote, threshold)
            .await?)
    }

    /// Deletes the config and cascades its aggregate post records. Posts
    /// already sent to the starboard channel stay where they are.
    pub async fn delete_starboard(
        &self,
        guild_id: u64,
        config_id: i64,
    ) -> Result<bool, EngineError> {
        if !self.configs.delete(guild_id, config_id).await? {
            return Ok(false);
        }
        self.posts.remove_for_config(config_id).await?;
        Ok(true)
    }

    pub async fn list_starboards(&self, guild_id: u64) -> Vec<StarboardConfig> {
        self.configs.for_guild(guild_id).await
    }

    pub async fn set_threshold(
        &self,
        guild_id: u64,
        config_id: i64,
        threshold: i64,
    ) -> Result<bool, EngineError> {
        let threshold = threshold.max(1);
        Ok(self
            .configs
            .update(guild_id, config_id, |c| c.threshold = threshold)
            .await?)
    }

    pub async fn set_repost_after(
        &self,
        guild_id: u64,
        config_id: i64,
        repost_after: i64,
    ) -> Result<bool, EngineError> {
        let repost_after = repost_after.max(0);
        Ok(self
            .configs
            .update(guild_id, config_id, |c| c.repost_after = repost_after)
            .await?)
    }

    pub async fn set_allow_bot_authors(
        &self,
        guild_id: u64,
        config_id: i64,
        allow: bool,
    ) -> Result<bool, EngineError> {
        Ok(self
            .configs
            .update(guild_id, config_id, |c| c.allow_bot_authors = allow)
            .await?)
    }

    pub async fn set_remove_on_delete(
        &self,
        guild_id: u64,
        config_id: i64,
        remove: bool,
    ) -> Result<bool, EngineError> {
        Ok(self
            .configs
            .update(guild_id, config_id, |c| c.remove_on_delete = remove)
            .await?)
    }

    pub async fn set_remove_on_clear(
        &self,
        guild_id: u64,
        config_id: i64,
        remove: bool,
    ) -> Result<bool, EngineError> {
        Ok(self
            .configs
            .update(guild_id, config_id, |c| c.remove_on_clear = remove)
            .await?)
    }

    pub async fn set_remove_on_below_threshold(
        &self,
        guild_id: u64,
        config_id: i64,
        remove: bool,
    ) -> Result<bool, EngineError> {
        Ok(self
            .configs
            .update(guild_id, config_id, |c| c.remove_on_below_threshold = remove)
            .await?)
    }

    pub async fn set_filter_mode(
        &self,
        guild_id: u64,
        config_id: i64,
        mode: FilterMode,
    ) -> Result<bool, EngineError> {
        Ok(self.configs.set_filter_mode(guild_id, config_id, mode).await?)
    }

    /// Returns the channel's new membership in the filter list, or None
    /// for an unknown config.
    pub async fn toggle_filter_channel(
        &self,
        guild_id: u64,
        config_id: i64,
        channel_id: u64,
    ) -> Result<Option<bool>, EngineError> {
        Ok(self
            .configs
            .toggle_channel(guild_id, config_id, channel_id)
            .await?)
    }
}

fn compose_post(
    config: &StarboardConfig,
    message: &SourceMessage,
    extracted: &ExtractedContent,
    count: i64,
) -> PostContent {
    PostContent {
        header: format!("{} {} <#{}>", config.emote, count, message.channel_id),
        author_name: message.author_name.clone(),
        author_icon_url: message.author_icon_url.clone(),
        text: extracted.text.clone(),
        image_url: extracted.image_url.clone(),
        jump_url: format!(
            "https://discord.com/channels/{}/{}/{}",
            config.guild_id, message.channel_id, message.id
        ),
        timestamp: message.timestamp,
    }
}
