pub mod general;
pub mod stats;
pub mod status;
pub mod tickets;
pub mod verification;

pub use general::{bot_logs, help, ping};
pub use stats::{export_stats, reset_stats, statistics, stats_summary};
pub use status::status;
pub use tickets::{rating_average, ticket_panel};
pub use verification::{verification_block, verification_unblock};

/// Every command the framework registers
pub fn all() -> Vec<poise::Command<crate::Data, crate::Error>> {
    vec![
        ping(),
        help(),
        bot_logs(),
        ticket_panel(),
        rating_average(),
        verification_block(),
        verification_unblock(),
        status(),
        statistics(),
        stats_summary(),
        reset_stats(),
        export_stats(),
    ]
}
