use async_trait::async_trait;
use poise::serenity_prelude as serenity;

use crate::helpers::error::EngineError;

/// Snapshot of a source message, reduced to what the engine reads.
#[derive(Debug, Clone)]
pub struct SourceMessage {
    pub id: u64,
    pub channel_id: u64,
    pub author_name: String,
    pub author_icon_url: Option<String>,
    pub author_is_bot: bool,
    pub content: String,
    pub embed_description: Option<String>,
    pub embed_image_url: Option<String>,
    pub attachment_url: Option<String>,
    pub timestamp: serenity::Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactingUser {
    pub id: u64,
    pub is_bot: bool,
}

/// Fully rendered aggregate post: a plain-content header plus embed body.
#[derive(Debug, Clone, PartialEq)]
pub struct PostContent {
    /// `{emote} {count} <#channel>`
    pub header: String,
    pub author_name: String,
    pub author_icon_url: Option<String>,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub jump_url: String,
    pub timestamp: serenity::Timestamp,
}

/// Everything the engine needs from the chat platform, behind one seam so
/// the state machine can be driven by an in-memory client in tests.
#[async_trait]
pub trait MessageClient: Send + Sync {
    /// None when the message no longer exists (deleted out from under us).
    async fn fetch_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<Option<SourceMessage>, EngineError>;

    /// Users currently holding `emote` on the message, bots included; the
    /// caller filters.
    async fn reacting_users(
        &self,
        channel_id: u64,
        message_id: u64,
        emote: &str,
    ) -> Result<Vec<ReactingUser>, EngineError>;

    async fn send_post(&self, channel_id: u64, post: &PostContent) -> Result<u64, EngineError>;

    async fn edit_post(
        &self,
        channel_id: u64,
        message_id: u64,
        post: &PostContent,
    ) -> Result<(), EngineError>;

    async fn delete_post(&self, channel_id: u64, message_id: u64) -> Result<(), EngineError>;

    /// Ids of the most recent messages in a channel, newest first.
    async fn recent_message_ids(
        &self,
        channel_id: u64,
        limit: u8,
    ) -> Result<Vec<u64>, EngineError>;

    /// Whether the bot may send messages in the channel. False is a silent
    /// skip, never an error.
    async fn can_post(&self, channel_id: u64) -> bool;
}

/// Production client over the serenity context of the current event.
pub struct SerenityClient<'a> {
    pub ctx: &'a serenity::Context,
}

fn source_from(message: serenity::Message) -> SourceMessage {
    let embed = message.embeds.first();
    SourceMessage {
        id: message.id.get(),
        channel_id: message.channel_id.get(),
        author_name: message.author.name.clone(),
        author_icon_url: Some(message.author.face()),
        author_is_bot: message.author.bot,
        content: message.content.clone(),
        embed_description: embed.and_then(|e| e.description.clone()),
        embed_image_url: embed.and_then(|e| e.image.as_ref().map(|i| i.url.clone())),
        attachment_url: message.attachments.first().map(|a| a.url.clone()),
        timestamp: message.timestamp,
    }
}

fn build_embed(post: &PostContent) -> serenity::CreateEmbed {
    let mut author = serenity::CreateEmbedAuthor::new(&post.author_name);
    if let Some(icon) = &post.author_icon_url {
        author = author.icon_url(icon);
    }

    let mut embed = serenity::CreateEmbed::default()
        .author(author)
        .field("Original", &post.jump_url, false)
        .timestamp(post.timestamp);

    if let Some(text) = &post.text {
        embed = embed.description(text);
    }
    if let Some(image) = &post.image_url {
        embed = embed.image(image);
    }
    embed
}

fn parse_emote(emote: &str) -> Result<serenity::ReactionType, EngineError> {
    serenity::ReactionType::try_from(emote).map_err(|_| EngineError::BadEmote(emote.to_string()))
}

#[async_trait]
impl MessageClient for SerenityClient<'_> {
    async fn fetch_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<Option<SourceMessage>, EngineError> {
        let channel = serenity::ChannelId::new(channel_id);
        match channel
            .message(&self.ctx.http, serenity::MessageId::new(message_id))
            .await
        {
            Ok(message) => Ok(Some(source_from(message))),
            Err(serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response)))
                if response.status_code.as_u16() == 404 =>
            {
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn reacting_users(
        &self,
        channel_id: u64,
        message_id: u64,
        emote: &str,
    ) -> Result<Vec<ReactingUser>, EngineError> {
        let channel = serenity::ChannelId::new(channel_id);
        let message = serenity::MessageId::new(message_id);
        let reaction = parse_emote(emote)?;

        let mut users = Vec::new();
        let mut after: Option<serenity::UserId> = None;
        loop {
            let page = channel
                .reaction_users(&self.ctx.http, message, reaction.clone(), Some(100), after)
                .await?;
            users.extend(page.iter().map(|user| ReactingUser {
                id: user.id.get(),
                is_bot: user.bot,
            }));
            if page.len() < 100 {
                break;
            }
            after = page.last().map(|user| user.id);
        }
        Ok(users)
    }

    async fn send_post(&self, channel_id: u64, post: &PostContent) -> Result<u64, EngineError> {
        let builder = serenity::CreateMessage::new()
            .content(&post.header)
            .embed(build_embed(post));
        let message = serenity::ChannelId::new(channel_id)
            .send_message(&self.ctx.http, builder)
            .await?;
        Ok(message.id.get())
    }

    async fn edit_post(
        &self,
        channel_id: u64,
        message_id: u64,
        post: &PostContent,
    ) -> Result<(), EngineError> {
        let builder = serenity::EditMessage::new()
            .content(&post.header)
            .embed(build_embed(post));
        serenity::ChannelId::new(channel_id)
            .edit_message(&self.ctx.http, serenity::MessageId::new(message_id), builder)
            .await?;
        Ok(())
    }

    async fn delete_post(&self, channel_id: u64, message_id: u64) -> Result<(), EngineError> {
        serenity::ChannelId::new(channel_id)
            .delete_message(&self.ctx.http, serenity::MessageId::new(message_id))
            .await?;
        Ok(())
    }

    async fn recent_message_ids(
        &self,
        channel_id: u64,
        limit: u8,
    ) -> Result<Vec<u64>, EngineError> {
        let messages = serenity::ChannelId::new(channel_id)
            .messages(
                &self.ctx.http,
                serenity::GetMessages::new().limit(limit),
            )
            .await?;
        Ok(messages.iter().map(|m| m.id.get()).collect())
    }

    async fn can_post(&self, channel_id: u64) -> bool {
        let channel = match serenity::ChannelId::new(channel_id)
            .to_channel(self.ctx)
            .await
        {
            Ok(serenity::Channel::Guild(channel)) => channel,
            _ => return false,
        };

        let me = self.ctx.cache.current_user().id;
        match channel.permissions_for_user(&self.ctx.cache, me) {
            Ok(permissions) => permissions.send_messages(),
            // cache miss: let the send itself surface the failure
            Err(_) => true,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    use super::*;

    pub(crate) fn human_message(id: u64, channel_id: u64, content: &str) -> SourceMessage {
        SourceMessage {
            id,
            channel_id,
            author_name: "rin".to_string(),
            author_icon_url: None,
            author_is_bot: false,
            content: content.to_string(),
            embed_description: None,
            embed_image_url: None,
            attachment_url: None,
            timestamp: serenity::Timestamp::now(),
        }
    }

    #[derive(Debug, Clone)]
    struct ChannelMessage {
        id: u64,
        post: Option<PostContent>,
    }

    /// In-memory stand-in for Discord: source messages, reaction lists and
    /// per-channel message logs.
    #[derive(Default)]
    pub(crate) struct MockClient {
        sources: Mutex<HashMap<(u64, u64), SourceMessage>>,
        reactors: Mutex<HashMap<(u64, u64, String), Vec<ReactingUser>>>,
        channels: Mutex<HashMap<u64, Vec<ChannelMessage>>>,
        blocked: Mutex<HashSet<u64>>,
        next_id: AtomicU64,
    }

    impl MockClient {
        pub(crate) fn new() -> Self {
            Self {
                next_id: AtomicU64::new(1000),
                ..Self::default()
            }
        }

        pub(crate) fn put_source(&self, message: SourceMessage) {
            self.sources
                .lock()
                .unwrap()
                .insert((message.channel_id, message.id), message);
        }

        pub(crate) fn drop_source(&self, channel_id: u64, message_id: u64) {
            self.sources.lock().unwrap().remove(&(channel_id, message_id));
        }

        pub(crate) fn set_reactors(
            &self,
            channel_id: u64,
            message_id: u64,
            emote: &str,
            users: Vec<ReactingUser>,
        ) {
            self.reactors
                .lock()
                .unwrap()
                .insert((channel_id, message_id, emote.to_string()), users);
        }

        pub(crate) fn block_channel(&self, channel_id: u64) {
            self.blocked.lock().unwrap().insert(channel_id);
        }

        /// Simulate unrelated traffic burying the posts in a channel.
        pub(crate) fn push_unrelated(&self, channel_id: u64, count: usize) {
            let mut channels = self.channels.lock().unwrap();
            let log = channels.entry(channel_id).or_default();
            for _ in 0..count {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                log.push(ChannelMessage { id, post: None });
            }
        }

        pub(crate) fn posts_in(&self, channel_id: u64) -> Vec<(u64, PostContent)> {
            self.channels
                .lock()
                .unwrap()
                .get(&channel_id)
                .map(|log| {
                    log.iter()
                        .filter_map(|m| m.post.clone().map(|p| (m.id, p)))
                        .collect()
                })
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl MessageClient for MockClient {
        async fn fetch_message(
            &self,
            channel_id: u64,
            message_id: u64,
        ) -> Result<Option<SourceMessage>, EngineError> {
            if let Some(source) = self
                .sources
                .lock()
                .unwrap()
                .get(&(channel_id, message_id))
            {
                return Ok(Some(source.clone()));
            }
            // aggregate posts the mock itself sent are fetchable too
            let channels = self.channels.lock().unwrap();
            let found = channels
                .get(&channel_id)
                .is_some_and(|log| log.iter().any(|m| m.id == message_id));
            if found {
                let mut message = human_message(message_id, channel_id, "aggregate post");
                message.author_is_bot = true;
                Ok(Some(message))
            } else {
                Ok(None)
            }
        }

        async fn reacting_users(
            &self,
            channel_id: u64,
            message_id: u64,
            emote: &str,
        ) -> Result<Vec<ReactingUser>, EngineError> {
            Ok(self
                .reactors
                .lock()
                .unwrap()
                .get(&(channel_id, message_id, emote.to_string()))
                .cloned()
                .unwrap_or_default())
        }

        async fn send_post(
            &self,
            channel_id: u64,
            post: &PostContent,
        ) -> Result<u64, EngineError> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.channels
                .lock()
                .unwrap()
                .entry(channel_id)
                .or_default()
                .push(ChannelMessage {
                    id,
                    post: Some(post.clone()),
                });
            Ok(id)
        }

        async fn edit_post(
            &self,
            channel_id: u64,
            message_id: u64,
            post: &PostContent,
        ) -> Result<(), EngineError> {
            let mut channels = self.channels.lock().unwrap();
            let slot = channels
                .get_mut(&channel_id)
                .and_then(|log| log.iter_mut().find(|m| m.id == message_id));
            match slot {
                Some(message) => {
                    message.post = Some(post.clone());
                    Ok(())
                }
                None => Err(EngineError::ChannelUnavailable(channel_id)),
            }
        }

        async fn delete_post(&self, channel_id: u64, message_id: u64) -> Result<(), EngineError> {
            let mut channels = self.channels.lock().unwrap();
            let log = channels
                .get_mut(&channel_id)
                .ok_or(EngineError::ChannelUnavailable(channel_id))?;
            let before = log.len();
            log.retain(|m| m.id != message_id);
            if log.len() == before {
                return Err(EngineError::ChannelUnavailable(channel_id));
            }
            Ok(())
        }

        async fn recent_message_ids(
            &self,
            channel_id: u64,
            limit: u8,
        ) -> Result<Vec<u64>, EngineError> {
            Ok(self
                .channels
                .lock()
                .unwrap()
                .get(&channel_id)
                .map(|log| log.iter().rev().take(limit as usize).map(|m| m.id).collect())
                .unwrap_or_default())
        }

        async fn can_post(&self, channel_id: u64) -> bool {
            !self.blocked.lock().unwrap().contains(&channel_id)
        }
    }
}
