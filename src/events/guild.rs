use poise::serenity_prelude as serenity;
use tracing::{debug, info};

use crate::state::StatKind;
use crate::Data;

/// Count a human joining the server
pub async fn handle_member_add(member: &serenity::Member, data: &Data) {
    if member.user.bot {
        return;
    }
    info!("New member: {} joined {}", member.user.name, member.guild_id);
    data.stats.record(StatKind::NewMembers).await;
}

/// Count a human leaving the server
pub async fn handle_member_remove(user: &serenity::User, guild_id: serenity::GuildId, data: &Data) {
    if user.bot {
        return;
    }
    info!("Member left: {} left {}", user.name, guild_id);
    data.stats.record(StatKind::LeftMembers).await;
}

pub async fn handle_channel_create(channel: &serenity::GuildChannel, data: &Data) {
    debug!("Channel created: {} ({})", channel.name, channel.id);
    data.stats.record(StatKind::ChannelsCreated).await;
}

pub async fn handle_role_create(role: &serenity::Role, data: &Data) {
    debug!("Role created: {} ({})", role.name, role.id);
    data.stats.record(StatKind::RolesCreated).await;
}
