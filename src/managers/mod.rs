pub mod announcement_manager;
pub mod permission_checker;
pub mod rating_manager;
pub mod stats_manager;
pub mod ticket_manager;
pub mod verification_manager;

pub use announcement_manager::{
    create_shared_announcement_manager, AnnouncementManager, Publication,
    SharedAnnouncementManager,
};
pub use permission_checker::run_startup_permission_check;
pub use rating_manager::{
    create_shared_rating_manager, RatingManager, RatingSubmission, SharedRatingManager,
};
pub use stats_manager::{SharedStatsManager, StatsManager, StatsReport};
pub use ticket_manager::{
    CloseOutcome, CreateOutcome, SharedTicketManager, StaffOutcome, TicketManager, TicketSettings,
};
pub use verification_manager::{
    AcceptOutcome, CodeEntryOutcome, CodeOutcome, SharedVerificationManager, VerificationManager,
    VerificationSettings,
};
