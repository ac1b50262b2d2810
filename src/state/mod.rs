pub mod announcements;
pub mod challenge;
pub mod ratings;
pub mod stats;
pub mod store;
pub mod tickets;
pub mod verification;

pub use announcements::{AnnouncementIndex, AnnouncementRef, AnnouncementSlot};
pub use challenge::Challenge;
pub use ratings::{RatingAggregate, RatingMessageIndex, RatingRequest, SubmittedRatings};
pub use stats::{DailyStats, ServerStats, StatKind, TotalStats};
pub use store::{create_shared_record_store, Partition, RecordStore, SharedRecordStore};
pub use tickets::TicketOwners;
pub use verification::{Admissibility, BlockList, VerificationStats, VerificationTracker};
