use poise::serenity_prelude as serenity;
use poise::ChoiceParameter;
use tracing::{info, warn};

use crate::messages::{self, StatusKind};
use crate::platform::Render;
use crate::{Context, Error};

/// Broadcast a status update for a bot (outage, issue, maintenance, online)
#[poise::command(
    slash_command,
    guild_only,
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn status(
    ctx: Context<'_>,
    #[description = "What happened"] message: String,
    #[description = "The affected bot"] bot: serenity::Member,
    #[description = "Choose the status"] status: StatusKind,
) -> Result<(), Error> {
    let data = ctx.data();
    let Some(channel_id) = data.config.channels.status() else {
        warn!("/status used but no status channel is configured");
        ctx.send(
            poise::CreateReply::default()
                .content("No status channel is configured.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    };

    let subject = bot.display_name().to_string();
    let notice = messages::status_broadcast(
        status,
        &subject,
        &message,
        data.config.banners.status.as_deref(),
    );
    data.platform
        .send_message(channel_id, &Render::notice(notice))
        .await?;
    info!("Status for {} set to {:?} by {}", subject, status, ctx.author().name);

    ctx.send(
        poise::CreateReply::default()
            .content(format!("✅ Status for **{}** set to **{}**!", subject, status.name()))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
