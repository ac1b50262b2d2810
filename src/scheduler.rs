//! Periodic background jobs.
//!
//! Every job runs on its own interval and stops when the shutdown token is
//! cancelled. Each job recomputes its result from current state, so a
//! delayed or skipped tick does no harm.

use chrono::Utc;
use poise::serenity_prelude as serenity;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::managers::{SharedStatsManager, SharedTicketManager, SharedVerificationManager};
use crate::presence::PresenceRotator;

pub const OPENING_HOURS_REFRESH: Duration = Duration::from_secs(5 * 60);
pub const STATS_CLEANUP: Duration = Duration::from_secs(24 * 60 * 60);

pub struct Jobs {
    pub tickets: SharedTicketManager,
    pub verification: SharedVerificationManager,
    pub stats: SharedStatsManager,
    pub presence: Arc<PresenceRotator>,
    pub presence_interval: Duration,
    pub sweep_interval: Duration,
}

/// Spawn every job; they run until `shutdown` is cancelled
pub fn start(ctx: serenity::Context, jobs: Jobs, shutdown: &CancellationToken) -> Vec<JoinHandle<()>> {
    let Jobs {
        tickets,
        verification,
        stats,
        presence,
        presence_interval,
        sweep_interval,
    } = jobs;

    let handles = vec![
        every("presence", presence_interval, true, shutdown.clone(), move || {
            let ctx = ctx.clone();
            let presence = presence.clone();
            async move { presence.apply_next(&ctx) }
        }),
        every("opening hours", OPENING_HOURS_REFRESH, false, shutdown.clone(), move || {
            let tickets = tickets.clone();
            async move {
                if let Err(e) = tickets.refresh_opening_hours().await {
                    warn!("Failed to update opening hours: {}", e);
                }
            }
        }),
        every("verification sweep", sweep_interval, false, shutdown.clone(), move || {
            let verification = verification.clone();
            async move {
                verification.sweep_at(Utc::now());
                // Failed attempts also move the success rate
                verification.refresh_rules_panel().await;
            }
        }),
        every("stats cleanup", STATS_CLEANUP, false, shutdown.clone(), move || {
            let stats = stats.clone();
            async move {
                stats.cleanup_at(Utc::now()).await;
            }
        }),
    ];
    info!("Started {} background jobs", handles.len());
    handles
}

/// Run `job` every `period`. Missed ticks are delayed rather than bursted.
fn every<F, Fut>(
    name: &'static str,
    period: Duration,
    immediately: bool,
    shutdown: CancellationToken,
    mut job: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !immediately {
            // The first tick completes at once
            interval.tick().await;
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Stopping {} job", name);
                    break;
                }
                _ = interval.tick() => job().await,
            }
        }
    })
}
