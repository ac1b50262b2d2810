//! Recording [`Platform`] double for manager tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use poise::serenity_prelude::{ChannelId, GuildId, MessageId, RoleId, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{DmOutcome, EditOutcome, FollowUp, Platform, Render, UserSummary};
use crate::error::Result;

/// Every outbound call, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateChannel {
        guild_id: GuildId,
        name: String,
        category: Option<ChannelId>,
        owner: UserId,
        channel_id: ChannelId,
    },
    Grant {
        channel_id: ChannelId,
        user_id: UserId,
    },
    DeleteChannel(ChannelId),
    Send {
        channel_id: ChannelId,
        message_id: MessageId,
        render: Render,
    },
    Edit {
        channel_id: ChannelId,
        message_id: MessageId,
        render: Render,
    },
    Dm {
        user_id: UserId,
        message_id: Option<MessageId>,
        render: Render,
    },
    EditDm {
        user_id: UserId,
        message_id: MessageId,
        render: Render,
    },
    AddRole {
        user_id: UserId,
        role_id: RoleId,
    },
}

#[derive(Default)]
pub struct RecordingPlatform {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
    users: Mutex<HashMap<UserId, UserSummary>>,
    refusing_dms: Mutex<HashSet<UserId>>,
    missing_messages: Mutex<HashSet<MessageId>>,
    history: Mutex<HashMap<ChannelId, Vec<(MessageId, String)>>>,
    roles: Mutex<HashMap<String, RoleId>>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            ..Default::default()
        }
    }

    pub fn with_user(self, id: u64, name: &str) -> Self {
        let user_id = UserId::new(id);
        self.users.lock().insert(
            user_id,
            UserSummary {
                id: user_id,
                name: name.to_string(),
                avatar_url: None,
            },
        );
        self
    }

    pub fn with_role(self, name: &str, id: u64) -> Self {
        self.roles.lock().insert(name.to_string(), RoleId::new(id));
        self
    }

    pub fn refuse_dms(&self, user_id: UserId) {
        self.refusing_dms.lock().insert(user_id);
    }

    /// Make edits of `message_id` report it as gone
    pub fn forget_message(&self, message_id: MessageId) {
        self.missing_messages.lock().insert(message_id);
    }

    /// Pretend the bot once posted a message titled `title` in `channel_id`
    pub fn seed_history(&self, channel_id: ChannelId, message_id: MessageId, title: &str) {
        self.history
            .lock()
            .entry(channel_id)
            .or_default()
            .push((message_id, title.to_string()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn created_channels(&self) -> Vec<ChannelId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreateChannel { channel_id, .. } => Some(channel_id),
                _ => None,
            })
            .collect()
    }

    pub fn sent_to(&self, channel_id: ChannelId) -> Vec<Render> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send {
                    channel_id: ch,
                    render,
                    ..
                } if ch == channel_id => Some(render),
                _ => None,
            })
            .collect()
    }

    pub fn dms_to(&self, user_id: UserId) -> Vec<(Option<MessageId>, Render)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Dm {
                    user_id: u,
                    message_id,
                    render,
                } if u == user_id => Some((message_id, render)),
                _ => None,
            })
            .collect()
    }

    fn allocate(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl Platform for RecordingPlatform {
    async fn resolve_user(&self, user_id: UserId) -> Result<Option<UserSummary>> {
        Ok(self.users.lock().get(&user_id).cloned())
    }

    async fn create_ticket_channel(
        &self,
        guild_id: GuildId,
        name: &str,
        category: Option<ChannelId>,
        owner: UserId,
    ) -> Result<ChannelId> {
        let channel_id = ChannelId::new(self.allocate());
        self.record(Call::CreateChannel {
            guild_id,
            name: name.to_string(),
            category,
            owner,
            channel_id,
        });
        Ok(channel_id)
    }

    async fn grant_channel_access(&self, channel_id: ChannelId, user_id: UserId) -> Result<()> {
        self.record(Call::Grant {
            channel_id,
            user_id,
        });
        Ok(())
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<()> {
        self.record(Call::DeleteChannel(channel_id));
        Ok(())
    }

    async fn send_message(&self, channel_id: ChannelId, render: &Render) -> Result<MessageId> {
        let message_id = MessageId::new(self.allocate());
        self.record(Call::Send {
            channel_id,
            message_id,
            render: render.clone(),
        });
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        render: &Render,
    ) -> Result<EditOutcome> {
        if self.missing_messages.lock().contains(&message_id) {
            return Ok(EditOutcome::NotFound);
        }
        self.record(Call::Edit {
            channel_id,
            message_id,
            render: render.clone(),
        });
        Ok(EditOutcome::Edited)
    }

    async fn find_recent_message(
        &self,
        channel_id: ChannelId,
        marker: &str,
        limit: u8,
    ) -> Result<Option<MessageId>> {
        let history = self.history.lock();
        Ok(history.get(&channel_id).and_then(|messages| {
            messages
                .iter()
                .rev()
                .take(usize::from(limit))
                .find(|(_, title)| title.contains(marker))
                .map(|(id, _)| *id)
        }))
    }

    async fn send_dm(&self, user_id: UserId, render: &Render) -> Result<DmOutcome> {
        if self.refusing_dms.lock().contains(&user_id) {
            self.record(Call::Dm {
                user_id,
                message_id: None,
                render: render.clone(),
            });
            return Ok(DmOutcome::Refused);
        }

        let channel_id = ChannelId::new(self.allocate());
        let message_id = MessageId::new(self.allocate());
        self.record(Call::Dm {
            user_id,
            message_id: Some(message_id),
            render: render.clone(),
        });
        Ok(DmOutcome::Sent {
            channel_id,
            message_id,
        })
    }

    async fn edit_dm(
        &self,
        user_id: UserId,
        message_id: MessageId,
        render: &Render,
    ) -> Result<EditOutcome> {
        if self.missing_messages.lock().contains(&message_id) {
            return Ok(EditOutcome::NotFound);
        }
        self.record(Call::EditDm {
            user_id,
            message_id,
            render: render.clone(),
        });
        Ok(EditOutcome::Edited)
    }

    async fn find_role(&self, _guild_id: GuildId, name: &str) -> Result<Option<RoleId>> {
        Ok(self.roles.lock().get(name).copied())
    }

    async fn add_role(
        &self,
        _guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
        _reason: &str,
    ) -> Result<()> {
        self.record(Call::AddRole { user_id, role_id });
        Ok(())
    }
}

/// Collects follow-up notes
#[derive(Default)]
pub struct RecordingFollowUp {
    notes: Mutex<Vec<String>>,
}

impl RecordingFollowUp {
    pub fn notes(&self) -> Vec<String> {
        self.notes.lock().clone()
    }
}

#[async_trait]
impl FollowUp for RecordingFollowUp {
    async fn follow_up(&self, content: &str) {
        self.notes.lock().push(content.to_string());
    }
}
