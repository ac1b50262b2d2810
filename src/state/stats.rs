use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Kinds of server activity that are counted per day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKind {
    NewMembers,
    LeftMembers,
    Messages,
    VoiceJoins,
    ReactionsAdded,
    CommandsUsed,
    ChannelsCreated,
    RolesCreated,
}

/// Counters for one calendar day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyStats {
    pub new_members: u64,
    pub left_members: u64,
    pub messages: u64,
    pub voice_joins: u64,
    pub reactions_added: u64,
    pub commands_used: u64,
    pub channels_created: u64,
    pub roles_created: u64,
}

impl DailyStats {
    fn counter_mut(&mut self, kind: StatKind) -> &mut u64 {
        match kind {
            StatKind::NewMembers => &mut self.new_members,
            StatKind::LeftMembers => &mut self.left_members,
            StatKind::Messages => &mut self.messages,
            StatKind::VoiceJoins => &mut self.voice_joins,
            StatKind::ReactionsAdded => &mut self.reactions_added,
            StatKind::CommandsUsed => &mut self.commands_used,
            StatKind::ChannelsCreated => &mut self.channels_created,
            StatKind::RolesCreated => &mut self.roles_created,
        }
    }

    pub fn get(&self, kind: StatKind) -> u64 {
        match kind {
            StatKind::NewMembers => self.new_members,
            StatKind::LeftMembers => self.left_members,
            StatKind::Messages => self.messages,
            StatKind::VoiceJoins => self.voice_joins,
            StatKind::ReactionsAdded => self.reactions_added,
            StatKind::CommandsUsed => self.commands_used,
            StatKind::ChannelsCreated => self.channels_created,
            StatKind::RolesCreated => self.roles_created,
        }
    }

    fn merge(&mut self, other: &DailyStats) {
        self.new_members += other.new_members;
        self.left_members += other.left_members;
        self.messages += other.messages;
        self.voice_joins += other.voice_joins;
        self.reactions_added += other.reactions_added;
        self.commands_used += other.commands_used;
        self.channels_created += other.channels_created;
        self.roles_created += other.roles_created;
    }

    /// Joins minus leaves
    pub fn net_growth(&self) -> i64 {
        self.new_members as i64 - self.left_members as i64
    }
}

/// All-time totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TotalStats {
    pub total_joins: u64,
    pub total_leaves: u64,
    pub total_messages: u64,
    /// Human member count seen at the last `/statistics`
    pub total_members: u64,
}

/// Persisted activity counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerStats {
    /// "YYYY-MM-DD" -> counters
    pub daily_stats: BTreeMap<String, DailyStats>,
    pub total_stats: TotalStats,
}

impl ServerStats {
    pub fn record(&mut self, kind: StatKind, date: NaiveDate, amount: u64) {
        let key = date.format(DATE_FORMAT).to_string();
        *self.daily_stats.entry(key).or_default().counter_mut(kind) += amount;

        match kind {
            StatKind::NewMembers => self.total_stats.total_joins += amount,
            StatKind::LeftMembers => self.total_stats.total_leaves += amount,
            StatKind::Messages => self.total_stats.total_messages += amount,
            _ => {}
        }
    }

    pub fn day(&self, date: NaiveDate) -> DailyStats {
        self.daily_stats
            .get(&date.format(DATE_FORMAT).to_string())
            .copied()
            .unwrap_or_default()
    }

    /// Per-day counters for the `days` days ending at `end`, oldest first
    pub fn breakdown(&self, end: NaiveDate, days: u64) -> Vec<(NaiveDate, DailyStats)> {
        (0..days)
            .rev()
            .filter_map(|offset| end.checked_sub_days(Days::new(offset)))
            .map(|date| (date, self.day(date)))
            .collect()
    }

    /// Sum of the `days` days ending at `end`
    pub fn window(&self, end: NaiveDate, days: u64) -> DailyStats {
        let mut sum = DailyStats::default();
        for (_, day) in self.breakdown(end, days) {
            sum.merge(&day);
        }
        sum
    }

    /// Drop days strictly before `cutoff`; returns how many were removed.
    /// Keys that do not parse as dates are dropped as well.
    pub fn prune_before(&mut self, cutoff: NaiveDate) -> usize {
        let before = self.daily_stats.len();
        self.daily_stats.retain(|key, _| {
            NaiveDate::parse_from_str(key, DATE_FORMAT)
                .map(|date| date >= cutoff)
                .unwrap_or(false)
        });
        before - self.daily_stats.len()
    }
}
