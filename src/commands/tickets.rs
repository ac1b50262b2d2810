use tracing::info;

use crate::platform::discord::create_reply;
use crate::platform::Render;
use crate::{Context, Error};

/// Post the ticket board in this channel
#[poise::command(
    slash_command,
    guild_only,
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn ticket_panel(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let message_id = ctx.data().tickets.post_panel(ctx.channel_id()).await?;
    info!(
        "Ticket panel posted in {} by {} (message {})",
        ctx.channel_id(),
        ctx.author().name,
        message_id
    );

    ctx.send(
        poise::CreateReply::default()
            .content("✅ Ticket panel posted.")
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Show the average support rating
#[poise::command(slash_command)]
pub async fn rating_average(ctx: Context<'_>) -> Result<(), Error> {
    let notice = ctx.data().tickets.average_notice().await;
    ctx.send(create_reply(&Render::notice(notice), false)).await?;
    Ok(())
}

