use thiserror::Error;

/// Errors surfaced by the starboard engine.
///
/// Most of these never reach a user: an unavailable channel aborts one
/// (event, config) pair silently, and delete failures are swallowed at the
/// call site. What does propagate is logged by the event handler.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("discord api error: {0}")]
    Api(#[from] poise::serenity_prelude::Error),

    #[error("channel {0} unavailable")]
    ChannelUnavailable(u64),

    #[error("unrecognised emote: {0}")]
    BadEmote(String),
}
