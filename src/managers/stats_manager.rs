use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use poise::serenity_prelude::GuildId;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::state::{
    DailyStats, Partition, ServerStats, SharedRecordStore, StatKind, TotalStats,
};

/// Days of daily counters kept by the cleanup
pub const RETENTION_DAYS: u64 = 30;
/// Length of the `/statistics` window
pub const REPORT_DAYS: u64 = 7;

/// Everything `/statistics` shows, computed for one "today"
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    pub today: NaiveDate,
    pub week: DailyStats,
    pub breakdown: Vec<(NaiveDate, DailyStats)>,
    pub totals: TotalStats,
}

impl StatsReport {
    /// Per-day average over the report window
    pub fn daily_average(&self, kind: StatKind) -> f64 {
        self.week.get(kind) as f64 / REPORT_DAYS as f64
    }

    /// Average daily messages per member, in percent
    pub fn activity_rate(&self, members: u64) -> f64 {
        self.daily_average(StatKind::Messages) / members.max(1) as f64 * 100.0
    }
}

#[derive(Serialize)]
struct StatsExport<'a> {
    server_name: &'a str,
    server_id: u64,
    export_date: String,
    statistics: &'a ServerStats,
}

/// Daily activity counters, keyed by the local calendar day
pub struct StatsManager {
    store: SharedRecordStore,
    tz: Tz,
    stats: Mutex<ServerStats>,
}

impl StatsManager {
    pub async fn load(store: SharedRecordStore, tz: Tz) -> Self {
        let stats: ServerStats = store.load_or_default(Partition::ServerStats).await;
        info!("Loaded activity statistics for {} days", stats.daily_stats.len());
        Self {
            store,
            tz,
            stats: Mutex::new(stats),
        }
    }

    pub fn today_at(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    pub async fn record(&self, kind: StatKind) {
        self.record_at(kind, Utc::now()).await;
    }

    pub async fn record_at(&self, kind: StatKind, now: DateTime<Utc>) {
        let today = self.today_at(now);
        let mut stats = self.stats.lock().await;
        stats.record(kind, today, 1);
        debug!("Recorded {:?} for {}", kind, today);
        self.persist(&stats).await;
    }

    /// Remember the current human member count for the totals
    pub async fn observe_members(&self, members: u64) {
        let mut stats = self.stats.lock().await;
        if stats.total_stats.total_members != members {
            stats.total_stats.total_members = members;
            self.persist(&stats).await;
        }
    }

    pub async fn report_at(&self, now: DateTime<Utc>) -> StatsReport {
        let today = self.today_at(now);
        let stats = self.stats.lock().await;
        StatsReport {
            today,
            week: stats.window(today, REPORT_DAYS),
            breakdown: stats.breakdown(today, REPORT_DAYS),
            totals: stats.total_stats,
        }
    }

    pub async fn today(&self, now: DateTime<Utc>) -> DailyStats {
        let today = self.today_at(now);
        self.stats.lock().await.day(today)
    }

    pub async fn snapshot(&self) -> ServerStats {
        self.stats.lock().await.clone()
    }

    /// Wipe every counter, daily and all-time
    pub async fn reset(&self) {
        let mut stats = self.stats.lock().await;
        *stats = ServerStats::default();
        self.persist(&stats).await;
        info!("Server statistics were reset");
    }

    /// Drop daily counters older than the retention window; returns how many
    pub async fn cleanup_at(&self, now: DateTime<Utc>) -> usize {
        let today = self.today_at(now);
        let Some(cutoff) = today.checked_sub_days(Days::new(RETENTION_DAYS)) else {
            return 0;
        };

        let mut stats = self.stats.lock().await;
        let removed = stats.prune_before(cutoff);
        if removed > 0 {
            self.persist(&stats).await;
            info!("Cleaned up {} old statistic entries", removed);
        }
        removed
    }

    /// Pretty JSON of every counter, wrapped with the server it came from
    pub async fn export_json(
        &self,
        server_name: &str,
        guild_id: GuildId,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let stats = self.stats.lock().await;
        let export = StatsExport {
            server_name,
            server_id: guild_id.get(),
            export_date: now.with_timezone(&self.tz).to_rfc3339(),
            statistics: &stats,
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }

    pub fn export_file_name(&self, guild_id: GuildId, now: DateTime<Utc>) -> String {
        format!(
            "stats_export_{}_{}.json",
            guild_id,
            now.with_timezone(&self.tz).format("%Y%m%d_%H%M%S")
        )
    }

    async fn persist(&self, stats: &ServerStats) {
        if let Err(e) = self.store.save(Partition::ServerStats, stats).await {
            error!("Failed to save server statistics: {}", e);
        }
    }
}

pub type SharedStatsManager = Arc<StatsManager>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_shared_record_store;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    async fn manager(dir: &tempfile::TempDir) -> StatsManager {
        StatsManager::load(create_shared_record_store(dir.path()), chrono_tz::Europe::Berlin).await
    }

    #[tokio::test]
    async fn test_days_follow_local_time() {
        let dir = tempfile::tempdir().unwrap();
        let stats = manager(&dir).await;

        // 23:30 UTC is already the next day in Berlin
        stats
            .record_at(StatKind::Messages, utc("2025-10-20T23:30:00Z"))
            .await;
        let snapshot = stats.snapshot().await;
        assert!(snapshot.daily_stats.contains_key("2025-10-21"));
    }

    #[tokio::test]
    async fn test_counters_persist() {
        let dir = tempfile::tempdir().unwrap();
        let now = utc("2025-10-20T10:00:00Z");
        {
            let stats = manager(&dir).await;
            stats.record_at(StatKind::NewMembers, now).await;
            stats.record_at(StatKind::NewMembers, now).await;
            stats.record_at(StatKind::LeftMembers, now).await;
        }

        let stats = manager(&dir).await;
        let today = stats.today(now).await;
        assert_eq!(today.new_members, 2);
        assert_eq!(today.net_growth(), 1);

        let report = stats.report_at(now).await;
        assert_eq!(report.totals.total_joins, 2);
        assert_eq!(report.breakdown.len(), 7);
        assert_eq!(report.breakdown[6].0, today_date("2025-10-20"));
    }

    fn today_date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_cleanup_keeps_thirty_days() {
        let dir = tempfile::tempdir().unwrap();
        let stats = manager(&dir).await;
        stats
            .record_at(StatKind::Messages, utc("2025-09-01T10:00:00Z"))
            .await;
        stats
            .record_at(StatKind::Messages, utc("2025-09-20T10:00:00Z"))
            .await;
        stats
            .record_at(StatKind::Messages, utc("2025-10-20T10:00:00Z"))
            .await;

        let removed = stats.cleanup_at(utc("2025-10-20T10:00:00Z")).await;
        assert_eq!(removed, 1);
        assert_eq!(stats.snapshot().await.total_stats.total_messages, 3);
        assert_eq!(stats.cleanup_at(utc("2025-10-20T10:00:00Z")).await, 0);
    }

    #[tokio::test]
    async fn test_export_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let stats = manager(&dir).await;
        let now = utc("2025-10-20T10:00:00Z");
        stats.record_at(StatKind::ReactionsAdded, now).await;

        let json = stats
            .export_json("Test Server", GuildId::new(42), now)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["server_name"], "Test Server");
        assert_eq!(value["server_id"], 42);
        assert_eq!(
            value["statistics"]["daily_stats"]["2025-10-20"]["reactions_added"],
            1
        );
        assert_eq!(
            stats.export_file_name(GuildId::new(42), now),
            "stats_export_42_20251020_120000.json"
        );

        stats.reset().await;
        assert_eq!(stats.snapshot().await, ServerStats::default());
    }

    #[test]
    fn test_activity_rate() {
        let week = DailyStats {
            messages: 70,
            ..Default::default()
        };
        let report = StatsReport {
            today: today_date("2025-10-20"),
            week,
            breakdown: Vec::new(),
            totals: TotalStats::default(),
        };
        assert_eq!(report.daily_average(StatKind::Messages), 10.0);
        assert_eq!(report.activity_rate(20), 50.0);
        assert_eq!(report.activity_rate(0), 1000.0);
    }
}
