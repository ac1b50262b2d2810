use chrono::{DateTime, Utc};
use poise::serenity_prelude::{ChannelId, GuildId, MessageId, UserId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{BannerConfig, BotConfig};
use crate::error::Result;
use crate::hours::BusinessHours;
use crate::managers::announcement_manager::{Publication, SharedAnnouncementManager};
use crate::managers::rating_manager::{RatingSubmission, SharedRatingManager};
use crate::messages;
use crate::platform::{
    DmOutcome, EditOutcome, FollowUp, Notice, Render, SharedPlatform, UserSummary,
};
use crate::state::{AnnouncementSlot, Partition, RatingRequest, SharedRecordStore, TicketOwners};

/// Where tickets live and what they look like
#[derive(Debug, Clone, Default)]
pub struct TicketSettings {
    pub category: Option<ChannelId>,
    pub panel_channel: Option<ChannelId>,
    pub opening_hours_channel: Option<ChannelId>,
    pub log_channel: Option<ChannelId>,
    pub banners: BannerConfig,
}

impl TicketSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            category: config.channels.ticket_category(),
            panel_channel: config.channels.ticket_panel(),
            opening_hours_channel: config.channels.opening_hours(),
            log_channel: config.channels.ticket_log(),
            banners: config.banners.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created { channel_id: ChannelId },
    /// Outside opening hours; nothing was allocated
    SupportClosed { reply: Render },
}

/// Outcome of claim / release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaffOutcome {
    Done,
    NotPermitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseOutcome {
    pub creator: Option<UserId>,
    /// The rating request DM, if one could be delivered
    pub rating_request: Option<MessageId>,
}

/// Drives a ticket from creation to closure and collects its rating
pub struct TicketManager {
    platform: SharedPlatform,
    store: SharedRecordStore,
    ratings: SharedRatingManager,
    announcements: SharedAnnouncementManager,
    hours: BusinessHours,
    settings: TicketSettings,
    owners: Mutex<TicketOwners>,
}

impl TicketManager {
    pub async fn load(
        platform: SharedPlatform,
        store: SharedRecordStore,
        ratings: SharedRatingManager,
        announcements: SharedAnnouncementManager,
        hours: BusinessHours,
        settings: TicketSettings,
    ) -> Self {
        let owners: TicketOwners = store.load_or_default(Partition::TicketOwners).await;
        info!("Loaded {} open tickets", owners.len());
        Self {
            platform,
            store,
            ratings,
            announcements,
            hours,
            settings,
            owners: Mutex::new(owners),
        }
    }

    pub async fn create(&self, guild_id: GuildId, requester: &UserSummary) -> Result<CreateOutcome> {
        self.create_at(guild_id, requester, Utc::now()).await
    }

    pub async fn create_at(
        &self,
        guild_id: GuildId,
        requester: &UserSummary,
        now: DateTime<Utc>,
    ) -> Result<CreateOutcome> {
        if !self.hours.is_open_at(now) {
            debug!("Ticket request by {} outside opening hours", requester.id);
            return Ok(CreateOutcome::SupportClosed {
                reply: messages::support_closed(
                    &self.hours.schedule_text(),
                    self.settings.banners.support_times.as_deref(),
                ),
            });
        }

        let name = ticket_channel_name(&requester.name);
        let channel_id = self
            .platform
            .create_ticket_channel(guild_id, &name, self.settings.category, requester.id)
            .await?;

        {
            let mut owners = self.owners.lock().await;
            owners.insert(channel_id, requester.id);
            self.persist(&owners).await;
        }

        let welcome = messages::ticket_welcome(requester.id, self.settings.banners.tickets.as_deref());
        if let Err(e) = self.platform.send_message(channel_id, &welcome).await {
            warn!("Failed to post welcome in ticket {}: {}", channel_id, e);
        }

        let confirmation = Render::notice(messages::ticket_created(channel_id));
        match self.platform.send_dm(requester.id, &confirmation).await {
            Ok(DmOutcome::Sent { .. }) => {}
            Ok(DmOutcome::Refused) => {
                warn!("Could not send DM to user {} - DMs disabled", requester.id)
            }
            Err(e) => warn!("Failed to confirm ticket to {}: {}", requester.id, e),
        }

        info!("Ticket {} created for {} ({})", name, requester.name, requester.id);
        Ok(CreateOutcome::Created { channel_id })
    }

    /// Give a staff member access to the ticket and announce it
    pub async fn claim(
        &self,
        channel_id: ChannelId,
        ticket_name: &str,
        actor: UserId,
        can_manage: bool,
        follow_up: &dyn FollowUp,
    ) -> Result<StaffOutcome> {
        if !can_manage {
            return Ok(StaffOutcome::NotPermitted);
        }

        self.platform.grant_channel_access(channel_id, actor).await?;
        self.platform
            .send_message(
                channel_id,
                &messages::ticket_claimed(actor, self.settings.banners.tickets.as_deref()),
            )
            .await?;
        info!("Ticket {} claimed by {}", ticket_name, actor);

        let creator = self.owners.lock().await.creator(channel_id);
        if let Some(creator) = creator {
            let update = Render::notice(messages::ticket_claimed_dm(ticket_name, actor));
            match self.platform.send_dm(creator, &update).await {
                Ok(DmOutcome::Sent { .. }) => {}
                Ok(DmOutcome::Refused) => {
                    warn!("Could not send DM to user {} - DMs disabled", creator);
                    follow_up
                        .follow_up("The ticket creator has DMs disabled and was not notified.")
                        .await;
                }
                Err(e) => warn!("Failed to notify {} about claim: {}", creator, e),
            }
        }
        Ok(StaffOutcome::Done)
    }

    /// Announce that the actor stepped back. Access granted by a claim stays.
    pub async fn release(
        &self,
        channel_id: ChannelId,
        ticket_name: &str,
        actor: UserId,
        can_manage: bool,
    ) -> Result<StaffOutcome> {
        if !can_manage {
            return Ok(StaffOutcome::NotPermitted);
        }

        self.platform
            .send_message(
                channel_id,
                &messages::ticket_released(actor, self.settings.banners.tickets.as_deref()),
            )
            .await?;
        info!("Ticket {} released by {}", ticket_name, actor);
        Ok(StaffOutcome::Done)
    }

    /// Forget the ticket, send the creator a rating request and delete the
    /// channel. The channel is deleted even if the request cannot be sent.
    pub async fn close(
        &self,
        guild_id: Option<GuildId>,
        channel_id: ChannelId,
        ticket_name: &str,
        actor: UserId,
        follow_up: &dyn FollowUp,
    ) -> Result<CloseOutcome> {
        let creator = {
            let mut owners = self.owners.lock().await;
            let creator = owners.remove(channel_id);
            if creator.is_some() {
                self.persist(&owners).await;
            }
            creator
        };

        let rating_request = match creator {
            Some(creator) => self
                .request_rating(guild_id, creator, ticket_name, follow_up)
                .await
                .unwrap_or_else(|e| {
                    error!("Error sending rating request for {}: {}", ticket_name, e);
                    None
                }),
            None => {
                info!("No creator recorded for {}, skipping rating request", ticket_name);
                None
            }
        };

        self.platform.delete_channel(channel_id).await?;
        info!("Ticket {} closed by {}", ticket_name, actor);

        Ok(CloseOutcome {
            creator,
            rating_request,
        })
    }

    async fn request_rating(
        &self,
        guild_id: Option<GuildId>,
        creator: UserId,
        ticket_name: &str,
        follow_up: &dyn FollowUp,
    ) -> Result<Option<MessageId>> {
        let Some(user) = self.platform.resolve_user(creator).await? else {
            warn!("Could not find user with ID {}", creator);
            return Ok(None);
        };

        let request = messages::rating_request(ticket_name, self.settings.banners.rating.as_deref());
        match self.platform.send_dm(user.id, &request).await? {
            DmOutcome::Sent { message_id, .. } => {
                self.ratings
                    .record_request(
                        message_id,
                        RatingRequest::new(user.id, guild_id, Some(ticket_name.to_string())),
                    )
                    .await;
                self.log_action("Ticket closed and rating request sent", ticket_name, Some(&user))
                    .await;
                info!("Rating request sent to {} ({})", user.name, user.id);
                Ok(Some(message_id))
            }
            DmOutcome::Refused => {
                warn!("Could not send DM to user {} - DMs disabled", user.id);
                follow_up
                    .follow_up("User has DMs disabled, could not send rating request.")
                    .await;
                Ok(None)
            }
        }
    }

    /// Count a rating given on a rating-request DM and lock that DM
    pub async fn submit_rating(
        &self,
        message_id: MessageId,
        stars: u8,
        rater: &UserSummary,
    ) -> RatingSubmission {
        let submission = self.ratings.submit(message_id, stars).await;

        if let RatingSubmission::Accepted {
            stars,
            ratings,
            request,
        } = &submission
        {
            let ticket_name = request.as_ref().and_then(|r| r.ticket_name.as_deref());
            let locked = messages::rating_request_submitted(
                ticket_name,
                *stars,
                ratings,
                self.settings.banners.rating.as_deref(),
            );
            match self.platform.edit_dm(rater.id, message_id, &locked).await {
                Ok(EditOutcome::Edited) => {}
                Ok(EditOutcome::NotFound) => info!("Rating message {} not found", message_id),
                Err(e) => warn!("Error updating rating message {}: {}", message_id, e),
            }

            let from_guild = request.as_ref().and_then(|r| r.guild()).is_some();
            if let (Some(name), true) = (ticket_name, from_guild) {
                self.log_action(
                    &format!("Ticket rated with {}/5 stars", stars),
                    name,
                    Some(rater),
                )
                .await;
            }
        }
        submission
    }

    pub async fn average_notice(&self) -> Notice {
        messages::rating_average(&self.ratings.aggregate().await)
    }

    /// Re-apply the read-only rendering to every answered rating request.
    /// Returns how many messages were edited.
    pub async fn reconcile(&self) -> usize {
        let aggregate = self.ratings.aggregate().await;
        let mut edited = 0;

        for answered in self.ratings.answered_requests().await {
            let Some(user) = answered.request.user() else {
                continue;
            };
            let locked = messages::rating_request_submitted(
                answered.request.ticket_name.as_deref(),
                answered.stars,
                &aggregate,
                self.settings.banners.rating.as_deref(),
            );
            match self.platform.edit_dm(user, answered.message_id, &locked).await {
                Ok(EditOutcome::Edited) => {
                    debug!("Rating message {} for user {} updated", answered.message_id, user);
                    edited += 1;
                }
                Ok(EditOutcome::NotFound) => {
                    info!("Rating message {} not found", answered.message_id)
                }
                Err(e) => warn!("Error updating rating message {}: {}", answered.message_id, e),
            }
        }

        if edited > 0 {
            info!("Reconciled {} answered rating requests", edited);
        }
        edited
    }

    /// Keep the ticket board in its configured channel
    pub async fn publish_panel(&self) -> Result<Option<Publication>> {
        let Some(channel_id) = self.settings.panel_channel else {
            return Ok(None);
        };
        let panel = messages::ticket_panel(self.settings.banners.tickets.as_deref());
        self.announcements
            .upsert(AnnouncementSlot::TicketPanel, channel_id, &panel)
            .await
            .map(Some)
    }

    /// Post a fresh ticket board in `channel_id` and make it the live one
    pub async fn post_panel(&self, channel_id: ChannelId) -> Result<MessageId> {
        let panel = messages::ticket_panel(self.settings.banners.tickets.as_deref());
        let message_id = self.platform.send_message(channel_id, &panel).await?;
        self.announcements
            .rebind(AnnouncementSlot::TicketPanel, channel_id, message_id)
            .await;
        Ok(message_id)
    }

    pub async fn refresh_opening_hours(&self) -> Result<Option<Publication>> {
        self.refresh_opening_hours_at(Utc::now()).await
    }

    pub async fn refresh_opening_hours_at(&self, now: DateTime<Utc>) -> Result<Option<Publication>> {
        let Some(channel_id) = self.settings.opening_hours_channel else {
            return Ok(None);
        };
        let status = messages::opening_hours_status(
            self.hours.is_open_at(now),
            &self.hours.schedule_text(),
            now,
        );
        self.announcements
            .upsert(AnnouncementSlot::OpeningHours, channel_id, &status)
            .await
            .map(Some)
    }

    #[cfg(test)]
    pub async fn open_tickets(&self) -> usize {
        self.owners.lock().await.len()
    }

    async fn log_action(&self, action: &str, ticket_name: &str, user: Option<&UserSummary>) {
        let Some(log_channel) = self.settings.log_channel else {
            return;
        };
        let entry = Render::notice(messages::ticket_log(action, ticket_name, user, Utc::now()));
        if let Err(e) = self.platform.send_message(log_channel, &entry).await {
            warn!("Failed to write ticket log: {}", e);
        }
    }

    async fn persist(&self, owners: &TicketOwners) {
        if let Err(e) = self.store.save(Partition::TicketOwners, owners).await {
            error!("Error saving ticket information: {}", e);
        }
    }
}

/// `ticket-<name>` in the form Discord gives text channels
pub fn ticket_channel_name(user_name: &str) -> String {
    let slug: String = user_name
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "ticket".to_string()
    } else {
        format!("ticket-{}", slug)
    }
}

pub type SharedTicketManager = Arc<TicketManager>;
