use poise::serenity_prelude as serenity;

use crate::structs::starboard_message::FilterMode;
use crate::types::{Context, Error};

// presentation only; every decision lives in the engine

#[derive(poise::ChoiceParameter)]
pub enum FilterModeChoice {
    #[name = "whitelist"]
    Whitelist,
    #[name = "blacklist"]
    Blacklist,
}

#[derive(poise::ChoiceParameter)]
pub enum RemovalPolicy {
    #[name = "source-deleted"]
    SourceDeleted,
    #[name = "reactions-cleared"]
    ReactionsCleared,
    #[name = "below-threshold"]
    BelowThreshold,
}

#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    subcommands(
        "create",
        "delete",
        "list",
        "threshold",
        "repost",
        "allow_bots",
        "removal",
        "mode",
        "channel"
    )
)]
pub async fn starboard(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say("Subcommands: create, delete, list, threshold, repost, allow_bots, removal, mode, channel")
        .await?;
    Ok(())
}

#[poise::command(slash_command, prefix_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn create(
    ctx: Context<'_>,
    #[description = "Channel the starboard posts into"] channel: serenity::GuildChannel,
    #[description = "Emote to track"] emote: String,
    #[description = "Reactions required"] threshold: i64,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let id = ctx
        .data()
        .starboard
        .create_starboard(guild_id.get(), channel.id.get(), emote, threshold)
        .await?;
    ctx.say(format!("Starboard #{id} created, posting into #{}", channel.name))
        .await?;
    Ok(())
}

#[poise::command(slash_command, prefix_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn delete(
    ctx: Context<'_>,
    #[description = "Starboard id"] config_id: i64,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let deleted = ctx
        .data()
        .starboard
        .delete_starboard(guild_id.get(), config_id)
        .await?;
    if deleted {
        ctx.say(format!("Starboard #{config_id} deleted")).await?;
    } else {
        ctx.say(format!("No starboard #{config_id} in this guild")).await?;
    }
    Ok(())
}

#[poise::command(slash_command, prefix_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let configs = ctx.data().starboard.list_starboards(guild_id.get()).await;
    if configs.is_empty() {
        ctx.say("No starboards configured").await?;
        return Ok(());
    }

    let mut reply = String::new();
    for config in configs {
        reply.push_str(&format!(
            "#{}: {} x{} -> <#{}> ({}, repost after {}, bots {})\n",
            config.id,
            config.emote,
            config.threshold,
            config.target_channel_id,
            config.filter_mode.as_str(),
            config.repost_after,
            if config.allow_bot_authors { "allowed" } else { "blocked" },
        ));
    }
    ctx.say(reply).await?;
    Ok(())
}

#[poise::command(slash_command, prefix_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn threshold(
    ctx: Context<'_>,
    #[description = "Starboard id"] config_id: i64,
    #[description = "Reactions required"] value: i64,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let changed = ctx
        .data()
        .starboard
        .set_threshold(guild_id.get(), config_id, value)
        .await?;
    reply_changed(ctx, config_id, changed).await
}

#[poise::command(slash_command, prefix_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn repost(
    ctx: Context<'_>,
    #[description = "Starboard id"] config_id: i64,
    #[description = "Repost when buried past this many messages, 0 to disable"] value: i64,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let changed = ctx
        .data()
        .starboard
        .set_repost_after(guild_id.get(), config_id, value)
        .await?;
    reply_changed(ctx, config_id, changed).await
}

#[poise::command(slash_command, prefix_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn allow_bots(
    ctx: Context<'_>,
    #[description = "Starboard id"] config_id: i64,
    #[description = "Whether bot-authored messages may be starred"] allowed: bool,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let changed = ctx
        .data()
        .starboard
        .set_allow_bot_authors(guild_id.get(), config_id, allowed)
        .await?;
    reply_changed(ctx, config_id, changed).await
}

#[poise::command(slash_command, prefix_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn removal(
    ctx: Context<'_>,
    #[description = "Starboard id"] config_id: i64,
    #[description = "Which removal trigger"] policy: RemovalPolicy,
    #[description = "Remove the post when it fires"] value: bool,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let starboard = &ctx.data().starboard;
    let changed = match policy {
        RemovalPolicy::SourceDeleted => {
            starboard
                .set_remove_on_delete(guild_id.get(), config_id, value)
                .await?
        }
        RemovalPolicy::ReactionsCleared => {
            starboard
                .set_remove_on_clear(guild_id.get(), config_id, value)
                .await?
        }
        RemovalPolicy::BelowThreshold => {
            starboard
                .set_remove_on_below_threshold(guild_id.get(), config_id, value)
                .await?
        }
    };
    reply_changed(ctx, config_id, changed).await
}

#[poise::command(slash_command, prefix_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn mode(
    ctx: Context<'_>,
    #[description = "Starboard id"] config_id: i64,
    #[description = "Channel filter mode"] mode: FilterModeChoice,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let mode = match mode {
        FilterModeChoice::Whitelist => FilterMode::Whitelist,
        FilterModeChoice::Blacklist => FilterMode::Blacklist,
    };
    let changed = ctx
        .data()
        .starboard
        .set_filter_mode(guild_id.get(), config_id, mode)
        .await?;
    reply_changed(ctx, config_id, changed).await
}

#[poise::command(slash_command, prefix_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn channel(
    ctx: Context<'_>,
    #[description = "Starboard id"] config_id: i64,
    #[description = "Channel to toggle in the filter list"] channel: serenity::GuildChannel,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    match ctx
        .data()
        .starboard
        .toggle_filter_channel(guild_id.get(), config_id, channel.id.get())
        .await?
    {
        Some(true) => {
            ctx.say(format!("#{} added to starboard #{config_id}'s filter list", channel.name))
                .await?
        }
        Some(false) => {
            ctx.say(format!(
                "#{} removed from starboard #{config_id}'s filter list",
                channel.name
            ))
            .await?
        }
        None => ctx.say(format!("No starboard #{config_id} in this guild")).await?,
    };
    Ok(())
}

async fn reply_changed(ctx: Context<'_>, config_id: i64, changed: bool) -> Result<(), Error> {
    if changed {
        ctx.say(format!("Starboard #{config_id} updated")).await?;
    } else {
        ctx.say(format!("No starboard #{config_id} in this guild")).await?;
    }
    Ok(())
}
