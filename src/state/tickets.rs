use poise::serenity_prelude::{ChannelId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ticket channel -> creator. The durable source of truth for who gets the
/// rating request once the channel itself is gone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketOwners {
    entries: BTreeMap<String, u64>,
}

impl TicketOwners {
    pub fn insert(&mut self, channel_id: ChannelId, creator: UserId) {
        self.entries.insert(channel_id.to_string(), creator.get());
    }

    pub fn creator(&self, channel_id: ChannelId) -> Option<UserId> {
        self.entries
            .get(&channel_id.to_string())
            .filter(|id| **id != 0)
            .map(|id| UserId::new(*id))
    }

    pub fn remove(&mut self, channel_id: ChannelId) -> Option<UserId> {
        self.entries
            .remove(&channel_id.to_string())
            .filter(|id| *id != 0)
            .map(UserId::new)
    }

    pub fn contains(&self, channel_id: ChannelId) -> bool {
        self.entries.contains_key(&channel_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_mapping() {
        let mut owners = TicketOwners::default();
        owners.insert(ChannelId::new(100), UserId::new(7));

        assert_eq!(owners.creator(ChannelId::new(100)), Some(UserId::new(7)));
        assert_eq!(owners.remove(ChannelId::new(100)), Some(UserId::new(7)));
        assert_eq!(owners.remove(ChannelId::new(100)), None);
        assert!(owners.is_empty());
    }

    #[test]
    fn test_legacy_format() {
        let owners: TicketOwners = serde_json::from_str(r#"{"1421": 55}"#).unwrap();
        assert_eq!(owners.creator(ChannelId::new(1421)), Some(UserId::new(55)));
    }
}
