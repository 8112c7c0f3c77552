use crate::helpers::client::MessageClient;
use crate::helpers::error::EngineError;
use crate::structs::starboard_message::StarboardConfig;

/// Count the distinct non-bot users currently holding `emote` on a message.
///
/// Recomputed in full from the live reaction list on every triggering event
/// rather than kept as an incremental counter: one extra read per event buys
/// immunity to missed or duplicated gateway deliveries.
pub async fn star_count<C: MessageClient + ?Sized>(
    client: &C,
    channel_id: u64,
    message_id: u64,
    emote: &str,
) -> Result<i64, EngineError> {
    let mut reactors = client.reacting_users(channel_id, message_id, emote).await?;
    reactors.retain(|user| !user.is_bot);
    reactors.sort_unstable_by_key(|user| user.id);
    reactors.dedup_by_key(|user| user.id);
    Ok(reactors.len() as i64)
}

pub fn meets_threshold(count: i64, config: &StarboardConfig) -> bool {
    count >= config.threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::client::tests::MockClient;
    use crate::helpers::client::ReactingUser;

    #[tokio::test]
    async fn bots_and_duplicates_do_not_count() {
        let client = MockClient::new();
        client.set_reactors(
            10,
            100,
            "⭐",
            vec![
                ReactingUser { id: 1, is_bot: false },
                ReactingUser { id: 1, is_bot: false },
                ReactingUser { id: 2, is_bot: false },
                ReactingUser { id: 3, is_bot: true },
            ],
        );

        assert_eq!(star_count(&client, 10, 100, "⭐").await.unwrap(), 2);
        // no reactions recorded for another emote
        assert_eq!(star_count(&client, 10, 100, "🔥").await.unwrap(), 0);
    }

    #[test]
    fn threshold_one_posts_on_first_star() {
        let config = StarboardConfig::new(1, 20, "⭐".to_string(), 1);
        assert!(meets_threshold(1, &config));
        assert!(!meets_threshold(0, &config));
    }
}
