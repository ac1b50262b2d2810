use poise::serenity_prelude as serenity;

use crate::state::StatKind;
use crate::Data;

/// Count guild messages written by humans
pub async fn handle_message(msg: &serenity::Message, data: &Data) {
    if msg.author.bot || msg.guild_id.is_none() {
        return;
    }
    data.stats.record(StatKind::Messages).await;
}

/// Count reactions added by humans in the server
pub async fn handle_reaction_add(reaction: &serenity::Reaction, data: &Data) {
    if reaction.guild_id.is_none() {
        return;
    }
    let by_bot = reaction
        .member
        .as_ref()
        .map(|m| m.user.bot)
        .unwrap_or(false);
    if by_bot {
        return;
    }
    data.stats.record(StatKind::ReactionsAdded).await;
}

/// Count a human entering voice from outside any voice channel
pub async fn handle_voice_state_update(
    old: Option<&serenity::VoiceState>,
    new: &serenity::VoiceState,
    data: &Data,
) {
    let joined = old.and_then(|s| s.channel_id).is_none() && new.channel_id.is_some();
    let by_bot = new.member.as_ref().map(|m| m.user.bot).unwrap_or(false);
    if joined && !by_bot {
        data.stats.record(StatKind::VoiceJoins).await;
    }
}
