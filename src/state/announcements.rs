use poise::serenity_prelude::{ChannelId, MessageId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A purpose that owns exactly one live message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnouncementSlot {
    OpeningHours,
    TicketPanel,
    RulesPanel,
}

impl AnnouncementSlot {
    pub fn key(&self) -> &'static str {
        match self {
            AnnouncementSlot::OpeningHours => "opening_hours",
            AnnouncementSlot::TicketPanel => "ticket_panel",
            AnnouncementSlot::RulesPanel => "rules_panel",
        }
    }

    /// Text every rendering of this slot carries in its embed title; used to
    /// recognise a prior announcement in channel history.
    pub fn marker(&self) -> &'static str {
        match self {
            AnnouncementSlot::OpeningHours => "Support Status:",
            AnnouncementSlot::TicketPanel => "Ticket System",
            AnnouncementSlot::RulesPanel => "SERVER RULES & GUIDELINES",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementRef {
    pub channel_id: u64,
    pub message_id: u64,
}

impl AnnouncementRef {
    pub fn new(channel_id: ChannelId, message_id: MessageId) -> Self {
        Self {
            channel_id: channel_id.get(),
            message_id: message_id.get(),
        }
    }

    pub fn channel(&self) -> Option<ChannelId> {
        (self.channel_id != 0).then(|| ChannelId::new(self.channel_id))
    }

    pub fn message(&self) -> Option<MessageId> {
        (self.message_id != 0).then(|| MessageId::new(self.message_id))
    }
}

/// Slot -> live message, so a restart edits instead of re-posting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnouncementIndex {
    entries: BTreeMap<String, AnnouncementRef>,
}

impl AnnouncementIndex {
    pub fn get(&self, slot: AnnouncementSlot) -> Option<AnnouncementRef> {
        self.entries.get(slot.key()).copied()
    }

    /// Bind a slot; returns true if the binding changed
    pub fn set(&mut self, slot: AnnouncementSlot, channel_id: ChannelId, message_id: MessageId) -> bool {
        let new = AnnouncementRef::new(channel_id, message_id);
        self.entries.insert(slot.key().to_string(), new) != Some(new)
    }

    pub fn clear(&mut self, slot: AnnouncementSlot) -> bool {
        self.entries.remove(slot.key()).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_binding() {
        let mut index = AnnouncementIndex::default();
        assert!(index.get(AnnouncementSlot::OpeningHours).is_none());

        assert!(index.set(AnnouncementSlot::OpeningHours, ChannelId::new(1), MessageId::new(2)));
        assert!(!index.set(AnnouncementSlot::OpeningHours, ChannelId::new(1), MessageId::new(2)));
        assert!(index.set(AnnouncementSlot::OpeningHours, ChannelId::new(1), MessageId::new(3)));

        let live = index.get(AnnouncementSlot::OpeningHours).unwrap();
        assert_eq!(live.message(), Some(MessageId::new(3)));
        assert!(index.get(AnnouncementSlot::TicketPanel).is_none());

        let json = serde_json::to_string(&index).unwrap();
        assert_eq!(json, r#"{"opening_hours":{"channel_id":1,"message_id":3}}"#);
    }
}
