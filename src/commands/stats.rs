use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use tracing::info;

use crate::messages::{self, GuildOverview};
use crate::platform::discord::{create_reply, summarize};
use crate::platform::Render;
use crate::{Context, Error};

/// Snapshot of the guild from the cache; the cache guard never crosses an await
fn guild_overview(ctx: Context<'_>) -> Option<GuildOverview> {
    let guild = ctx.guild()?;
    let humans = guild.members.values().filter(|m| !m.user.bot).count() as u64;
    Some(GuildOverview {
        name: guild.name.clone(),
        members: if humans > 0 { humans } else { guild.member_count },
        channels: guild.channels.len(),
        created: DateTime::from_timestamp(guild.id.created_at().unix_timestamp(), 0),
        icon_url: guild.icon_url(),
    })
}

/// Show server statistics for the last 7 days
#[poise::command(slash_command, guild_only)]
pub async fn statistics(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;
    let overview = guild_overview(ctx).ok_or("Server is not cached yet, try again shortly")?;

    let stats = &ctx.data().stats;
    stats.observe_members(overview.members).await;
    let now = Utc::now();
    let report = stats.report_at(now).await;

    let notice = messages::statistics(&overview, &report, &summarize(ctx.author()), now);
    ctx.send(create_reply(&Render::notice(notice), false)).await?;
    Ok(())
}

/// Show a quick summary of today's statistics
#[poise::command(slash_command, guild_only)]
pub async fn stats_summary(ctx: Context<'_>) -> Result<(), Error> {
    let stats = &ctx.data().stats;
    let now = Utc::now();
    let today = stats.today(now).await;

    let notice = messages::stats_summary(&today, stats.today_at(now), now);
    ctx.send(create_reply(&Render::notice(notice), false)).await?;
    Ok(())
}

/// Reset server statistics (Admin only)
#[poise::command(
    slash_command,
    guild_only,
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn reset_stats(ctx: Context<'_>) -> Result<(), Error> {
    ctx.data().stats.reset().await;
    info!("Statistics reset by {}", ctx.author().name);

    ctx.send(create_reply(&Render::notice(messages::stats_reset(Utc::now())), true))
        .await?;
    Ok(())
}

/// Export statistics as JSON file (Admin only)
#[poise::command(
    slash_command,
    guild_only,
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn export_stats(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let guild_id = ctx.guild_id().ok_or("This command must be used in a guild")?;
    let server_name = ctx
        .guild()
        .map(|g| g.name.clone())
        .unwrap_or_else(|| guild_id.to_string());

    let stats = &ctx.data().stats;
    let now = Utc::now();
    let json = stats.export_json(&server_name, guild_id, now).await?;
    let file_name = stats.export_file_name(guild_id, now);
    info!("Exporting statistics as {} for {}", file_name, ctx.author().name);

    ctx.send(
        poise::CreateReply::default()
            .content("📁 Here's your statistics export:")
            .attachment(serenity::CreateAttachment::bytes(json.into_bytes(), file_name))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
