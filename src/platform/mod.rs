//! Seam between the bot's managers and the chat platform.
//!
//! Managers only ever talk to [`Platform`]; the serenity-backed
//! implementation lives in [`discord`]. Failures the managers are expected to
//! handle (a refused DM, a vanished message) come back as outcome values
//! instead of errors.

pub mod discord;
#[cfg(test)]
pub mod mock;
pub mod render;

use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, GuildId, MessageId, RoleId, UserId};
use std::sync::Arc;

use crate::error::Result;

pub use discord::SerenityPlatform;
pub use render::{Controls, Notice, Render};

/// The bits of a user the bot renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl UserSummary {
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// Result of a direct-message send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmOutcome {
    Sent {
        channel_id: ChannelId,
        message_id: MessageId,
    },
    /// The recipient does not accept DMs from the bot
    Refused,
}

/// Result of editing an existing message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Edited,
    NotFound,
}

#[async_trait]
pub trait Platform: Send + Sync {
    /// Look a user up in the cache, falling back to the API
    async fn resolve_user(&self, user_id: UserId) -> Result<Option<UserSummary>>;

    /// Create a text channel only `owner` (and the bot) can see
    async fn create_ticket_channel(
        &self,
        guild_id: GuildId,
        name: &str,
        category: Option<ChannelId>,
        owner: UserId,
    ) -> Result<ChannelId>;

    /// Allow `user_id` to read and write in `channel_id`
    async fn grant_channel_access(&self, channel_id: ChannelId, user_id: UserId) -> Result<()>;

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<()>;

    async fn send_message(&self, channel_id: ChannelId, render: &Render) -> Result<MessageId>;

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        render: &Render,
    ) -> Result<EditOutcome>;

    /// Newest bot-authored message among the last `limit` whose embed title
    /// contains `marker`
    async fn find_recent_message(
        &self,
        channel_id: ChannelId,
        marker: &str,
        limit: u8,
    ) -> Result<Option<MessageId>>;

    async fn send_dm(&self, user_id: UserId, render: &Render) -> Result<DmOutcome>;

    async fn edit_dm(
        &self,
        user_id: UserId,
        message_id: MessageId,
        render: &Render,
    ) -> Result<EditOutcome>;

    async fn find_role(&self, guild_id: GuildId, name: &str) -> Result<Option<RoleId>>;

    async fn add_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
        reason: &str,
    ) -> Result<()>;
}

/// Shared platform handle
pub type SharedPlatform = Arc<dyn Platform>;

/// Private, best-effort note back to whoever triggered the current action
#[async_trait]
pub trait FollowUp: Send + Sync {
    async fn follow_up(&self, content: &str);
}
