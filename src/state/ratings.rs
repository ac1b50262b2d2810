use poise::serenity_prelude::{GuildId, MessageId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{BotError, Result};

/// Running summary of all accepted 1-5 star ratings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingAggregate {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub count: u64,
    /// Every accepted rating, oldest first
    #[serde(default)]
    pub ratings: Vec<u8>,
}

impl RatingAggregate {
    pub fn add(&mut self, stars: u8) -> Result<()> {
        if !(1..=5).contains(&stars) {
            return Err(BotError::InvalidRating { stars });
        }
        self.total += u64::from(stars);
        self.count += 1;
        self.ratings.push(stars);
        Ok(())
    }

    /// Mean rating, 0 when nothing was rated yet
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.total as f64 / self.count as f64
    }

    /// Number of ratings per star value, index 0 = one star
    pub fn distribution(&self) -> [u64; 5] {
        let mut counts = [0u64; 5];
        for stars in &self.ratings {
            if (1..=5).contains(stars) {
                counts[usize::from(*stars) - 1] += 1;
            }
        }
        counts
    }

    #[cfg(test)]
    pub fn is_consistent(&self) -> bool {
        self.count == self.ratings.len() as u64
            && self.total == self.ratings.iter().map(|r| u64::from(*r)).sum::<u64>()
    }

    /// Rebuild total and count from the history, dropping out-of-range
    /// entries. Returns true if anything changed.
    pub fn normalize(&mut self) -> bool {
        let before = self.clone();
        self.ratings.retain(|r| (1..=5).contains(r));
        self.total = self.ratings.iter().map(|r| u64::from(*r)).sum();
        self.count = self.ratings.len() as u64;
        *self != before
    }
}

/// Rating-request message -> stars already accepted for it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmittedRatings {
    entries: BTreeMap<String, u8>,
}

impl SubmittedRatings {
    pub fn get(&self, message_id: MessageId) -> Option<u8> {
        self.entries.get(&message_id.to_string()).copied()
    }

    pub fn contains(&self, message_id: MessageId) -> bool {
        self.entries.contains_key(&message_id.to_string())
    }

    pub fn insert(&mut self, message_id: MessageId, stars: u8) {
        self.entries.insert(message_id.to_string(), stars);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Who a dispatched rating request belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRequest {
    pub user_id: u64,
    #[serde(default)]
    pub guild_id: Option<u64>,
    #[serde(default)]
    pub ticket_name: Option<String>,
}

impl RatingRequest {
    pub fn new(user_id: UserId, guild_id: Option<GuildId>, ticket_name: Option<String>) -> Self {
        Self {
            user_id: user_id.get(),
            guild_id: guild_id.map(|g| g.get()),
            ticket_name,
        }
    }

    pub fn user(&self) -> Option<UserId> {
        (self.user_id != 0).then(|| UserId::new(self.user_id))
    }

    pub fn guild(&self) -> Option<GuildId> {
        self.guild_id.filter(|id| *id != 0).map(GuildId::new)
    }
}

/// Rating-request message -> recipient, survives restarts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingMessageIndex {
    entries: BTreeMap<String, RatingRequest>,
}

impl RatingMessageIndex {
    pub fn insert(&mut self, message_id: MessageId, request: RatingRequest) {
        self.entries.insert(message_id.to_string(), request);
    }

    pub fn get(&self, message_id: MessageId) -> Option<&RatingRequest> {
        self.entries.get(&message_id.to_string())
    }

    /// Entries with a parseable message id
    pub fn iter(&self) -> impl Iterator<Item = (MessageId, &RatingRequest)> + '_ {
        self.entries.iter().filter_map(|(id, request)| {
            id.parse::<u64>()
                .ok()
                .filter(|id| *id != 0)
                .map(|id| (MessageId::new(id), request))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
