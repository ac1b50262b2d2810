use async_trait::async_trait;
use poise::serenity_prelude::{
    self as serenity, ButtonStyle, Cache, ChannelId, CreateActionRow, CreateButton, CreateChannel,
    CreateEmbed, CreateEmbedFooter, CreateInteractionResponseFollowup, CreateMessage,
    CreateSelectMenu, CreateSelectMenuKind,
    CreateSelectMenuOption, EditMessage, GetMessages, GuildId, Http, MessageId,
    PermissionOverwrite, PermissionOverwriteType, Permissions, RoleId, Timestamp, User, UserId,
};
use std::sync::Arc;
use tracing::{debug, info};

use super::render::{Controls, Notice, Render};
use super::{DmOutcome, EditOutcome, Platform, UserSummary};
use crate::error::Result;
use crate::events::intent;
use crate::messages;

/// Discord JSON error code: cannot send messages to this user
const CANNOT_MESSAGE_USER: isize = 50007;
/// Discord JSON error codes: unknown channel / unknown message
const UNKNOWN_CHANNEL: isize = 10003;
const UNKNOWN_MESSAGE: isize = 10008;

/// [`Platform`] backed by serenity's HTTP client and cache
pub struct SerenityPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl SerenityPlatform {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }

    fn bot_id(&self) -> UserId {
        self.cache.current_user().id
    }
}

#[async_trait]
impl Platform for SerenityPlatform {
    async fn resolve_user(&self, user_id: UserId) -> Result<Option<UserSummary>> {
        if let Some(user) = self.cache.user(user_id) {
            return Ok(Some(summarize(&user)));
        }

        match self.http.get_user(user_id).await {
            Ok(user) => Ok(Some(summarize(&user))),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_ticket_channel(
        &self,
        guild_id: GuildId,
        name: &str,
        category: Option<ChannelId>,
        owner: UserId,
    ) -> Result<ChannelId> {
        let read_write = Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES;
        let overwrites = vec![
            PermissionOverwrite {
                allow: Permissions::empty(),
                deny: read_write,
                kind: PermissionOverwriteType::Role(guild_id.everyone_role()),
            },
            PermissionOverwrite {
                allow: read_write,
                deny: Permissions::empty(),
                kind: PermissionOverwriteType::Member(owner),
            },
            PermissionOverwrite {
                allow: read_write | Permissions::MANAGE_CHANNELS,
                deny: Permissions::empty(),
                kind: PermissionOverwriteType::Member(self.bot_id()),
            },
        ];

        let mut builder = CreateChannel::new(name)
            .kind(serenity::ChannelType::Text)
            .permissions(overwrites);
        if let Some(category) = category {
            builder = builder.category(category);
        }

        let channel = guild_id.create_channel(self.http.as_ref(), builder).await?;
        info!("Created ticket channel '{}' ({})", channel.name, channel.id);
        Ok(channel.id)
    }

    async fn grant_channel_access(&self, channel_id: ChannelId, user_id: UserId) -> Result<()> {
        channel_id
            .create_permission(
                self.http.as_ref(),
                PermissionOverwrite {
                    allow: Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES,
                    deny: Permissions::empty(),
                    kind: PermissionOverwriteType::Member(user_id),
                },
            )
            .await?;
        Ok(())
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<()> {
        match channel_id.delete(self.http.as_ref()).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => {
                info!("Channel {} was already gone", channel_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn send_message(&self, channel_id: ChannelId, render: &Render) -> Result<MessageId> {
        let message = channel_id
            .send_message(self.http.as_ref(), create_message(render))
            .await?;
        Ok(message.id)
    }

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        render: &Render,
    ) -> Result<EditOutcome> {
        match channel_id
            .edit_message(self.http.as_ref(), message_id, edit_message(render))
            .await
        {
            Ok(_) => Ok(EditOutcome::Edited),
            Err(e) if is_not_found(&e) => Ok(EditOutcome::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_recent_message(
        &self,
        channel_id: ChannelId,
        marker: &str,
        limit: u8,
    ) -> Result<Option<MessageId>> {
        let bot_id = self.bot_id();
        let messages = channel_id
            .messages(self.http.as_ref(), GetMessages::new().limit(limit))
            .await?;

        Ok(messages
            .iter()
            .find(|m| {
                m.author.id == bot_id
                    && m.embeds
                        .first()
                        .and_then(|e| e.title.as_deref())
                        .is_some_and(|title| title.contains(marker))
            })
            .map(|m| m.id))
    }

    async fn send_dm(&self, user_id: UserId, render: &Render) -> Result<DmOutcome> {
        let dm = match user_id.create_dm_channel(self.http.as_ref()).await {
            Ok(dm) => dm,
            Err(e) if is_dm_refused(&e) => return Ok(DmOutcome::Refused),
            Err(e) => return Err(e.into()),
        };

        match dm.id.send_message(self.http.as_ref(), create_message(render)).await {
            Ok(message) => Ok(DmOutcome::Sent {
                channel_id: dm.id,
                message_id: message.id,
            }),
            Err(e) if is_dm_refused(&e) => {
                debug!("DM to {} refused: {}", user_id, e);
                Ok(DmOutcome::Refused)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn edit_dm(
        &self,
        user_id: UserId,
        message_id: MessageId,
        render: &Render,
    ) -> Result<EditOutcome> {
        let dm = match user_id.create_dm_channel(self.http.as_ref()).await {
            Ok(dm) => dm,
            Err(e) if is_not_found(&e) || is_dm_refused(&e) => return Ok(EditOutcome::NotFound),
            Err(e) => return Err(e.into()),
        };
        self.edit_message(dm.id, message_id, render).await
    }

    async fn find_role(&self, guild_id: GuildId, name: &str) -> Result<Option<RoleId>> {
        let roles = guild_id.roles(self.http.as_ref()).await?;
        Ok(roles
            .iter()
            .find(|(_, role)| role.name == name)
            .map(|(id, _)| *id))
    }

    async fn add_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
        reason: &str,
    ) -> Result<()> {
        self.http
            .add_member_role(guild_id, user_id, role_id, Some(reason))
            .await?;
        Ok(())
    }
}

pub fn summarize(user: &User) -> UserSummary {
    UserSummary {
        id: user.id,
        name: user.name.clone(),
        avatar_url: Some(user.face()),
    }
}

/// Discord's JSON error code and HTTP status of a failed request
fn failure(err: &serenity::Error) -> Option<(isize, u16)> {
    match err {
        serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response)) => {
            Some((response.error.code, response.status_code.as_u16()))
        }
        _ => None,
    }
}

fn is_not_found(err: &serenity::Error) -> bool {
    matches!(
        failure(err),
        Some((UNKNOWN_CHANNEL | UNKNOWN_MESSAGE, _)) | Some((_, 404))
    )
}

fn is_dm_refused(err: &serenity::Error) -> bool {
    matches!(failure(err), Some((CANNOT_MESSAGE_USER, _)) | Some((_, 403)))
}

pub fn build_embed(notice: &Notice) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(&notice.title)
        .description(&notice.description)
        .colour(notice.colour);

    for field in &notice.fields {
        embed = embed.field(&field.name, &field.value, field.inline);
    }
    if let Some(footer) = &notice.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer));
    }
    if let Some(image) = &notice.image {
        embed = embed.image(image);
    }
    if let Some(thumbnail) = &notice.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }
    if let Some(at) = notice.timestamp {
        if let Ok(ts) = Timestamp::from_unix_timestamp(at.timestamp()) {
            embed = embed.timestamp(ts);
        }
    }
    embed
}

pub fn build_components(controls: &Controls) -> Vec<CreateActionRow> {
    match controls {
        Controls::None => vec![],
        Controls::TicketPanel => vec![
            CreateActionRow::Buttons(vec![CreateButton::new(intent::CREATE_TICKET)
                .label("➕ Create a Ticket")
                .style(ButtonStyle::Primary)]),
            CreateActionRow::Buttons(vec![CreateButton::new(intent::RATING_AVERAGE)
                .label("⭐ Rating Average")
                .style(ButtonStyle::Secondary)]),
        ],
        Controls::TicketActions => vec![CreateActionRow::Buttons(vec![
            CreateButton::new(intent::CLOSE_TICKET)
                .label("❌ Close the Ticket")
                .style(ButtonStyle::Danger),
            CreateButton::new(intent::CLAIM_TICKET)
                .label("🔒 Claim Ticket")
                .style(ButtonStyle::Secondary),
            CreateButton::new(intent::RELEASE_TICKET)
                .label("🔓 Release Ticket")
                .style(ButtonStyle::Secondary),
        ])],
        Controls::RatingRequest => vec![
            CreateActionRow::SelectMenu(
                CreateSelectMenu::new(
                    intent::RATING_SELECT,
                    CreateSelectMenuKind::String {
                        options: rating_options(),
                    },
                )
                .placeholder("Please rate our support"),
            ),
            CreateActionRow::Buttons(vec![CreateButton::new(intent::DM_RATING_AVERAGE)
                .label("⭐ Rating Average")
                .style(ButtonStyle::Secondary)]),
        ],
        Controls::RatingSubmitted {
            stars,
            average,
            count,
        } => vec![
            CreateActionRow::SelectMenu(
                CreateSelectMenu::new(
                    intent::RATING_SELECT,
                    CreateSelectMenuKind::String {
                        options: rating_options(),
                    },
                )
                .placeholder(messages::submitted_placeholder(*stars, *average, *count))
                .disabled(true),
            ),
            CreateActionRow::Buttons(vec![CreateButton::new(intent::DM_RATING_AVERAGE_DISABLED)
                .label("⭐ Rating Average")
                .style(ButtonStyle::Secondary)]),
        ],
        Controls::RulesPanel => vec![CreateActionRow::Buttons(vec![CreateButton::new(
            intent::ACCEPT_RULES,
        )
        .label("✅ I Accept All Rules")
        .style(ButtonStyle::Success)])],
        Controls::CodeEntry { owner } => vec![CreateActionRow::Buttons(vec![
            CreateButton::new(intent::code_entry_id(*owner))
                .label("🔐 Enter Code")
                .style(ButtonStyle::Primary),
        ])],
    }
}

fn rating_options() -> Vec<CreateSelectMenuOption> {
    (1..=5u8)
        .rev()
        .map(|stars| {
            CreateSelectMenuOption::new(messages::rating_label(stars), stars.to_string())
        })
        .collect()
}

pub fn create_message(render: &Render) -> CreateMessage {
    let mut message = CreateMessage::new();
    if let Some(content) = &render.content {
        message = message.content(content);
    }
    if let Some(notice) = &render.notice {
        message = message.embed(build_embed(notice));
    }
    let components = build_components(&render.controls);
    if !components.is_empty() {
        message = message.components(components);
    }
    message
}

/// Private follow-up to an already deferred interaction
pub fn create_followup(render: &Render) -> CreateInteractionResponseFollowup {
    let mut followup = CreateInteractionResponseFollowup::new().ephemeral(true);
    if let Some(content) = &render.content {
        followup = followup.content(content);
    }
    if let Some(notice) = &render.notice {
        followup = followup.embed(build_embed(notice));
    }
    let components = build_components(&render.controls);
    if !components.is_empty() {
        followup = followup.components(components);
    }
    followup
}

/// Command reply carrying `render`
pub fn create_reply(render: &Render, ephemeral: bool) -> poise::CreateReply {
    let mut reply = poise::CreateReply::default().ephemeral(ephemeral);
    if let Some(content) = &render.content {
        reply = reply.content(content);
    }
    if let Some(notice) = &render.notice {
        reply = reply.embed(build_embed(notice));
    }
    let components = build_components(&render.controls);
    if !components.is_empty() {
        reply = reply.components(components);
    }
    reply
}

fn edit_message(render: &Render) -> EditMessage {
    let mut message = EditMessage::new().components(build_components(&render.controls));
    if let Some(content) = &render.content {
        message = message.content(content);
    }
    if let Some(notice) = &render.notice {
        message = message.embed(build_embed(notice));
    }
    message
}
