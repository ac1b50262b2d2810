use poise::serenity_prelude as serenity;
use tracing::info;

use crate::{Context, Error};

/// Permanently bar a user from verifying
#[poise::command(
    slash_command,
    guild_only,
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn verification_block(
    ctx: Context<'_>,
    #[description = "User to block"] user: serenity::User,
) -> Result<(), Error> {
    let content = if ctx.data().verification.block(user.id).await {
        info!("{} blocked {} from verification", ctx.author().name, user.name);
        format!("⛔ {} is now blocked from verification.", user.name)
    } else {
        format!("{} is already blocked.", user.name)
    };

    ctx.send(poise::CreateReply::default().content(content).ephemeral(true))
        .await?;
    Ok(())
}

/// Lift a verification block
#[poise::command(
    slash_command,
    guild_only,
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn verification_unblock(
    ctx: Context<'_>,
    #[description = "User to unblock"] user: serenity::User,
) -> Result<(), Error> {
    let content = if ctx.data().verification.unblock(user.id).await {
        info!("{} unblocked {} from verification", ctx.author().name, user.name);
        format!("✅ {} may verify again.", user.name)
    } else {
        format!("{} was not blocked.", user.name)
    };

    ctx.send(poise::CreateReply::default().content(content).ephemeral(true))
        .await?;
    Ok(())
}
