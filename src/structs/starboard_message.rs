use std::collections::HashSet;

/// Channel filter behaviour for a starboard config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Only messages from channels in the filter list are considered.
    Whitelist,
    /// Messages from channels in the filter list are ignored.
    Blacklist,
}

impl FilterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMode::Whitelist => "whitelist",
            FilterMode::Blacklist => "blacklist",
        }
    }

    pub fn parse(s: &str) -> Option<FilterMode> {
        match s {
            "whitelist" => Some(FilterMode::Whitelist),
            "blacklist" => Some(FilterMode::Blacklist),
            _ => None,
        }
    }
}

/// One independently evaluated starboard rule set. A guild may own any
/// number of these, including several sharing a target channel or emote.
#[derive(Debug, Clone)]
pub struct StarboardConfig {
    pub id: i64,
    pub guild_id: u64,
    pub target_channel_id: u64,
    pub emote: String,
    pub threshold: i64,
    pub filter_mode: FilterMode,
    pub filter_channels: HashSet<u64>,
    pub allow_bot_authors: bool,
    pub remove_on_delete: bool,
    pub remove_on_clear: bool,
    pub remove_on_below_threshold: bool,
    /// Repost instead of editing when the post is no longer within the last
    /// N messages of the target channel. 0 disables reposting.
    pub repost_after: i64,
}

/// The mirrored message a config maintains for one source message.
/// (source_message_id, config_id) is unique: at most one of these exists
/// per pair at any instant.
#[derive(Debug, Clone)]
pub struct AggregatePost {
    pub source_message_id: u64,
    pub config_id: i64,
    /// Channel the post was actually sent to. Kept separately from the
    /// config's current target so retargeting still finds old posts.
    pub post_channel_id: u64,
    pub post_message_id: u64,
}

impl StarboardConfig {
    pub fn new(guild_id: u64, target_channel_id: u64, emote: String, threshold: i64) -> Self {
        Self {
            id: 0,
            guild_id,
            target_channel_id,
            emote,
            threshold,
            filter_mode: FilterMode::Blacklist,
            filter_channels: HashSet::new(),
            allow_bot_authors: false,
            remove_on_delete: true,
            remove_on_clear: true,
            remove_on_below_threshold: false,
            repost_after: 0,
        }
    }
}
