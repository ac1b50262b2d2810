use poise::serenity_prelude::{ChannelId, MessageId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::platform::{EditOutcome, Render, SharedPlatform};
use crate::state::{AnnouncementIndex, AnnouncementSlot, Partition, SharedRecordStore};

/// How many recent messages are scanned for a lost announcement
const HISTORY_SCAN_LIMIT: u8 = 10;

/// Where the live message of a slot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publication {
    /// The indexed message was edited in place
    Edited(MessageId),
    /// The index was stale; a prior message was found in channel history
    Recovered(MessageId),
    Created(MessageId),
}

impl Publication {
    pub fn message_id(&self) -> MessageId {
        match self {
            Publication::Edited(id) | Publication::Recovered(id) | Publication::Created(id) => *id,
        }
    }
}

/// Keeps exactly one live message per announcement slot across restarts
pub struct AnnouncementManager {
    platform: SharedPlatform,
    store: SharedRecordStore,
    /// Held for the whole upsert so two refreshes cannot both create
    index: Mutex<AnnouncementIndex>,
}

impl AnnouncementManager {
    pub fn new(platform: SharedPlatform, store: SharedRecordStore, index: AnnouncementIndex) -> Self {
        Self {
            platform,
            store,
            index: Mutex::new(index),
        }
    }

    pub async fn load(platform: SharedPlatform, store: SharedRecordStore) -> Self {
        let index = store.load_or_default(Partition::Announcements).await;
        Self::new(platform, store, index)
    }

    /// Render `render` into the slot's message in `channel_id`: edit the
    /// indexed message, else edit a recent one carrying the slot marker,
    /// else post a new one.
    pub async fn upsert(
        &self,
        slot: AnnouncementSlot,
        channel_id: ChannelId,
        render: &Render,
    ) -> Result<Publication> {
        let mut index = self.index.lock().await;

        if let Some(current) = index.get(slot) {
            match (current.channel(), current.message()) {
                (Some(ch), Some(msg)) if ch == channel_id => {
                    match self.platform.edit_message(ch, msg, render).await? {
                        EditOutcome::Edited => {
                            debug!("Updated {} message {}", slot.key(), msg);
                            return Ok(Publication::Edited(msg));
                        }
                        EditOutcome::NotFound => {
                            info!("{} message {} is gone, looking for another", slot.key(), msg);
                        }
                    }
                }
                _ => debug!("{} is bound to another channel, rebinding", slot.key()),
            }
        }

        let publication = match self
            .platform
            .find_recent_message(channel_id, slot.marker(), HISTORY_SCAN_LIMIT)
            .await?
        {
            Some(found) => match self.platform.edit_message(channel_id, found, render).await? {
                EditOutcome::Edited => {
                    info!("Found existing {} message: {}", slot.key(), found);
                    Some(Publication::Recovered(found))
                }
                EditOutcome::NotFound => None,
            },
            None => None,
        };

        let publication = match publication {
            Some(p) => p,
            None => {
                let created = self.platform.send_message(channel_id, render).await?;
                info!("Created new {} message: {}", slot.key(), created);
                Publication::Created(created)
            }
        };

        if index.set(slot, channel_id, publication.message_id()) {
            self.persist(&index).await;
        }
        Ok(publication)
    }

    /// Bind a slot to a message posted elsewhere (e.g. by a command)
    pub async fn rebind(&self, slot: AnnouncementSlot, channel_id: ChannelId, message_id: MessageId) {
        let mut index = self.index.lock().await;
        if index.set(slot, channel_id, message_id) {
            self.persist(&index).await;
        }
    }

    #[cfg(test)]
    pub async fn current(&self, slot: AnnouncementSlot) -> Option<(ChannelId, MessageId)> {
        let index = self.index.lock().await;
        index
            .get(slot)
            .and_then(|r| Some((r.channel()?, r.message()?)))
    }

    async fn persist(&self, index: &AnnouncementIndex) {
        if let Err(e) = self.store.save(Partition::Announcements, index).await {
            error!("Failed to save announcement index: {}", e);
        }
    }
}

pub type SharedAnnouncementManager = Arc<AnnouncementManager>;

pub async fn create_shared_announcement_manager(
    platform: SharedPlatform,
    store: SharedRecordStore,
) -> SharedAnnouncementManager {
    Arc::new(AnnouncementManager::load(platform, store).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{Call, RecordingPlatform};
    use crate::state::create_shared_record_store;

    fn render(title: &str) -> Render {
        Render::notice(crate::platform::Notice::new(title, "", 0))
    }

    async fn setup() -> (tempfile::TempDir, Arc<RecordingPlatform>, AnnouncementManager) {
        let dir = tempfile::tempdir().unwrap();
        let store = create_shared_record_store(dir.path());
        let platform = Arc::new(RecordingPlatform::new());
        let manager = AnnouncementManager::load(platform.clone(), store).await;
        (dir, platform, manager)
    }

    #[tokio::test]
    async fn test_creates_then_edits() {
        let (_dir, platform, manager) = setup().await;
        let channel = ChannelId::new(7);

        let first = manager
            .upsert(AnnouncementSlot::OpeningHours, channel, &render("Support Status: 🟢 OPEN"))
            .await
            .unwrap();
        assert!(matches!(first, Publication::Created(_)));

        let second = manager
            .upsert(AnnouncementSlot::OpeningHours, channel, &render("Support Status: 🔴 CLOSED"))
            .await
            .unwrap();
        assert_eq!(second, Publication::Edited(first.message_id()));

        let sends = platform
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Send { .. }))
            .count();
        assert_eq!(sends, 1);
    }

    #[tokio::test]
    async fn test_recovers_from_history_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_shared_record_store(dir.path());
        let platform = Arc::new(RecordingPlatform::new());
        let channel = ChannelId::new(7);
        let old = MessageId::new(55);
        platform.seed_history(channel, MessageId::new(54), "Something else");
        platform.seed_history(channel, old, "Support Status: 🔴 CLOSED");

        // No index on disk
        let manager = AnnouncementManager::load(platform.clone(), store.clone()).await;
        let publication = manager
            .upsert(AnnouncementSlot::OpeningHours, channel, &render("Support Status: 🟢 OPEN"))
            .await
            .unwrap();
        assert_eq!(publication, Publication::Recovered(old));
        assert!(platform.sent_to(channel).is_empty());

        // The recovered binding was persisted
        let index: AnnouncementIndex = store.load(Partition::Announcements).await.unwrap();
        assert_eq!(
            index.get(AnnouncementSlot::OpeningHours).and_then(|r| r.message()),
            Some(old)
        );
    }

    #[tokio::test]
    async fn test_vanished_message_is_replaced() {
        let (_dir, platform, manager) = setup().await;
        let channel = ChannelId::new(7);
        let first = manager
            .upsert(AnnouncementSlot::TicketPanel, channel, &render("Ticket System"))
            .await
            .unwrap();

        platform.forget_message(first.message_id());
        let second = manager
            .upsert(AnnouncementSlot::TicketPanel, channel, &render("Ticket System"))
            .await
            .unwrap();
        assert!(matches!(second, Publication::Created(id) if id != first.message_id()));
        assert_eq!(
            manager.current(AnnouncementSlot::TicketPanel).await,
            Some((channel, second.message_id()))
        );
    }
}
