use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::{BotError, Result};

/// A named, independently persisted group of records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Ticket channel -> creator
    TicketOwners,
    /// Running rating aggregate
    Ratings,
    /// Rating-request message -> accepted stars
    SubmittedRatings,
    /// Rating-request message -> recipient and ticket
    RatingMessages,
    /// Announcement slot -> live message
    Announcements,
    /// Users barred from verification
    VerificationBlocks,
    /// Activity counters
    ServerStats,
}

impl Partition {
    pub fn file_name(&self) -> &'static str {
        match self {
            Partition::TicketOwners => "ticket_info.json",
            Partition::Ratings => "ratings.json",
            Partition::SubmittedRatings => "submitted_ratings.json",
            Partition::RatingMessages => "rating_messages.json",
            Partition::Announcements => "announcements.json",
            Partition::VerificationBlocks => "verification_blocks.json",
            Partition::ServerStats => "server_stats.json",
        }
    }
}

/// JSON file per partition under a single data directory.
///
/// The store has no opinion about the records it holds: a missing file reads
/// as `T::default()`, and writes replace the whole partition atomically.
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the data directory if needed
    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| BotError::StateSave {
                path: self.root.display().to_string(),
                source: e,
            })
    }

    pub fn path(&self, partition: Partition) -> PathBuf {
        self.root.join(partition.file_name())
    }

    /// Load a partition, or its default if it was never written
    pub async fn load<T>(&self, partition: Partition) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let path = self.path(partition);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| BotError::StateParse {
                path: path.display().to_string(),
                source: e,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} not found, starting empty", path.display());
                Ok(T::default())
            }
            Err(e) => Err(BotError::StateLoad {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    /// Like [`load`](Self::load), but a broken partition is logged and
    /// replaced by its default so startup can continue. An unparsable file
    /// is moved to `<file>.corrupt` first so the next save cannot clobber it.
    pub async fn load_or_default<T>(&self, partition: Partition) -> T
    where
        T: DeserializeOwned + Default,
    {
        match self.load(partition).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not load {:?}: {}, using empty state", partition, e);
                if matches!(e, BotError::StateParse { .. }) {
                    self.set_aside(partition).await;
                }
                T::default()
            }
        }
    }

    /// Where an unparsable partition is kept for manual recovery
    pub fn corrupt_path(&self, partition: Partition) -> PathBuf {
        self.path(partition).with_extension("json.corrupt")
    }

    async fn set_aside(&self, partition: Partition) {
        let path = self.path(partition);
        let aside = self.corrupt_path(partition);
        match tokio::fs::rename(&path, &aside).await {
            Ok(()) => warn!("Moved unreadable {} to {}", path.display(), aside.display()),
            Err(e) => error!("Failed to move {} aside: {}", path.display(), e),
        }
    }

    /// Save a partition atomically (temp file + rename)
    pub async fn save<T>(&self, partition: Partition, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let path = self.path(partition);
        let content = serde_json::to_string_pretty(value)?;

        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(|e| BotError::StateSave {
                path: path.display().to_string(),
                source: e,
            })?;

        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| BotError::StateSave {
                path: path.display().to_string(),
                source: e,
            })?;

        Ok(())
    }
}

/// Shared record store type
pub type SharedRecordStore = Arc<RecordStore>;

pub fn create_shared_record_store(root: impl Into<PathBuf>) -> SharedRecordStore {
    Arc::new(RecordStore::new(root))
}
