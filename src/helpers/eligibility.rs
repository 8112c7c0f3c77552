use crate::helpers::client::SourceMessage;
use crate::structs::starboard_message::{FilterMode, StarboardConfig};

/// Author/channel gate for one config. Ineligible is terminal: the message
/// will never be posted to this config no matter how many reactions it has.
///
/// An empty whitelist admits nothing. The last gate — whether the bot can
/// send in the target channel — needs an API call, so the engine checks it
/// separately via `MessageClient::can_post` right after this.
pub fn passes_filters(message: &SourceMessage, config: &StarboardConfig) -> bool {
    if message.author_is_bot && !config.allow_bot_authors {
        return false;
    }

    match config.filter_mode {
        FilterMode::Blacklist => !config.filter_channels.contains(&message.channel_id),
        FilterMode::Whitelist => config.filter_channels.contains(&message.channel_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::client::tests::human_message;

    fn config() -> StarboardConfig {
        StarboardConfig::new(1, 20, "⭐".to_string(), 2)
    }

    #[test]
    fn bot_authors_blocked_unless_allowed() {
        let mut message = human_message(100, 10, "hey");
        message.author_is_bot = true;

        let mut config = config();
        assert!(!passes_filters(&message, &config));

        config.allow_bot_authors = true;
        assert!(passes_filters(&message, &config));
    }

    #[test]
    fn blacklist_blocks_listed_channel_only() {
        let message = human_message(100, 10, "hey");
        let mut config = config();
        config.filter_channels.insert(11);
        assert!(passes_filters(&message, &config));

        config.filter_channels.insert(10);
        assert!(!passes_filters(&message, &config));
    }

    #[test]
    fn whitelist_requires_listed_channel() {
        let message = human_message(100, 10, "hey");
        let mut config = config();
        config.filter_mode = FilterMode::Whitelist;

        // empty whitelist admits nothing
        assert!(!passes_filters(&message, &config));

        config.filter_channels.insert(10);
        assert!(passes_filters(&message, &config));

        config.filter_channels.clear();
        config.filter_channels.insert(11);
        assert!(!passes_filters(&message, &config));
    }
}
