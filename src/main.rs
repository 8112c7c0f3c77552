use std::env;
use std::sync::Arc;

use poise::serenity_prelude as serenity;
use serenity::all::FullEvent;
use tracing_subscriber::EnvFilter;

mod commands;
mod helpers;

mod structs;
mod types;
use types::{Data, Error};

use crate::commands::all_commands;
use crate::helpers::client::SerenityClient;
use crate::helpers::starboard::Database;
use crate::helpers::starboard_manager::Starboard;

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match &error {
        poise::FrameworkError::Setup { error, .. } => panic!("Failed to start bot: {}", error),
        poise::FrameworkError::Command { ctx, error, .. }
        | poise::FrameworkError::ArgumentParse { ctx, error, .. } => {
            tracing::error!("Command failed: `{}`: {:?}", ctx.command().name, error);
        }
        poise::FrameworkError::EventHandler { error, .. } => {
            // send/edit failures from the engine land here
            tracing::error!("Event handler failed: {:?}", error);
        }
        _ => {
            if let Err(e) = poise::builtins::on_error(error).await {
                tracing::error!("Unknown error: {}", e);
            }
        }
    }
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    let client = SerenityClient { ctx };
    match event {
        FullEvent::ReactionAdd { add_reaction } => {
            let Some(guild_id) = add_reaction.guild_id else {
                return Ok(());
            };
            data.starboard
                .reaction_added(
                    &client,
                    guild_id.get(),
                    add_reaction.channel_id.get(),
                    add_reaction.message_id.get(),
                    &add_reaction.emoji.to_string(),
                )
                .await?;
        }
        FullEvent::ReactionRemove { removed_reaction } => {
            let Some(guild_id) = removed_reaction.guild_id else {
                return Ok(());
            };
            data.starboard
                .reaction_removed(
                    &client,
                    guild_id.get(),
                    removed_reaction.channel_id.get(),
                    removed_reaction.message_id.get(),
                    &removed_reaction.emoji.to_string(),
                )
                .await?;
        }
        FullEvent::ReactionRemoveAll {
            channel_id,
            removed_from_message_id,
        } => {
            data.starboard
                .reactions_cleared(&client, channel_id.get(), removed_from_message_id.get())
                .await?;
        }
        FullEvent::MessageDelete {
            channel_id,
            deleted_message_id,
            ..
        } => {
            data.starboard
                .source_deleted(&client, channel_id.get(), deleted_message_id.get())
                .await?;
        }
        _ => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let token = env::var("DISCORD_TOKEN").expect("Missing DISCORD_TOKEN");
    let db_url = env::var("DATABASE_URL").expect("Missing DATABASE_URL");

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: all_commands(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some("s".into()),
                ..Default::default()
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                let db = Database::new(&db_url).await?;
                let starboard = Starboard::new(db).await?;
                tracing::info!("starboard engine ready");

                Ok(Data {
                    starboard: Arc::new(starboard),
                })
            })
        })
        .build();

    let mut client = serenity::Client::builder(token, intents)
        .framework(framework)
        .await?;

    client.start().await?;

    Ok(())
}
