use chrono::{DateTime, Duration, Utc};
use poise::serenity_prelude::UserId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Attempt bookkeeping for a single requester
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptRecord {
    pub count: u32,
    pub last_attempt: Option<DateTime<Utc>>,
}

/// Whether a requester may start a verification right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admissibility {
    Admissible,
    Blocked,
    Cooldown { remaining_minutes: i64 },
}

impl Admissibility {
    pub fn is_admissible(&self) -> bool {
        matches!(self, Admissibility::Admissible)
    }

    /// Human-readable denial reason (empty when admissible)
    pub fn reason(&self) -> String {
        match self {
            Admissibility::Admissible => String::new(),
            Admissibility::Blocked => "You are permanently blocked from verification".to_string(),
            Admissibility::Cooldown { remaining_minutes } => format!(
                "Cooldown active. Try again in {} minutes",
                remaining_minutes
            ),
        }
    }
}

/// Per-user verification attempt counter with cooldown and block list.
///
/// The counter of a user who has exhausted their attempts is only reset
/// lazily, by the first admissibility check after the cooldown elapsed.
/// [`sweep_at`](Self::sweep_at) drops stale records independently.
#[derive(Debug)]
pub struct VerificationTracker {
    attempts: HashMap<UserId, AttemptRecord>,
    blocked: HashSet<UserId>,
    max_attempts: u32,
    cooldown: Duration,
}

impl VerificationTracker {
    pub fn new(max_attempts: u32, cooldown: std::time::Duration) -> Self {
        Self {
            attempts: HashMap::new(),
            blocked: HashSet::new(),
            max_attempts,
            cooldown: Duration::from_std(cooldown).unwrap_or_else(|_| Duration::hours(1)),
        }
    }

    pub fn with_blocked(mut self, blocked: &BlockList) -> Self {
        self.blocked = blocked.user_ids().collect();
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn can_attempt(&mut self, user_id: UserId) -> Admissibility {
        self.can_attempt_at(user_id, Utc::now())
    }

    pub fn can_attempt_at(&mut self, user_id: UserId, now: DateTime<Utc>) -> Admissibility {
        if self.blocked.contains(&user_id) {
            return Admissibility::Blocked;
        }

        let Some(record) = self.attempts.get_mut(&user_id) else {
            return Admissibility::Admissible;
        };

        if record.count < self.max_attempts {
            return Admissibility::Admissible;
        }

        if let Some(last) = record.last_attempt {
            let elapsed = now - last;
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                return Admissibility::Cooldown {
                    remaining_minutes: remaining.num_seconds() / 60,
                };
            }
        }

        record.count = 0;
        Admissibility::Admissible
    }

    /// Count a failed attempt, returning the new count
    pub fn record_attempt(&mut self, user_id: UserId) -> u32 {
        self.record_attempt_at(user_id, Utc::now())
    }

    pub fn record_attempt_at(&mut self, user_id: UserId, now: DateTime<Utc>) -> u32 {
        let record = self.attempts.entry(user_id).or_default();
        record.count += 1;
        record.last_attempt = Some(now);
        record.count
    }

    /// Forget everything about a user, including a block
    pub fn reset(&mut self, user_id: UserId) {
        self.attempts.remove(&user_id);
        self.blocked.remove(&user_id);
    }

    pub fn attempts(&self, user_id: UserId) -> u32 {
        self.attempts.get(&user_id).map(|r| r.count).unwrap_or(0)
    }

    pub fn block(&mut self, user_id: UserId) -> bool {
        self.blocked.insert(user_id)
    }

    pub fn unblock(&mut self, user_id: UserId) -> bool {
        self.blocked.remove(&user_id)
    }

    pub fn is_blocked(&self, user_id: UserId) -> bool {
        self.blocked.contains(&user_id)
    }

    pub fn block_list(&self) -> BlockList {
        BlockList {
            users: self.blocked.iter().map(|u| u.get()).collect(),
        }
    }

    /// Drop attempt records whose last attempt is older than the cooldown.
    /// Returns the number of records removed.
    pub fn sweep_at(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.attempts.len();
        let cooldown = self.cooldown;
        self.attempts.retain(|_, record| match record.last_attempt {
            Some(last) => now - last <= cooldown,
            None => false,
        });
        before - self.attempts.len()
    }
}

/// Persisted set of users barred from verification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockList {
    pub users: BTreeSet<u64>,
}

impl BlockList {
    pub fn user_ids(&self) -> impl Iterator<Item = UserId> + '_ {
        self.users.iter().filter(|id| **id != 0).map(|id| UserId::new(*id))
    }
}

/// Process-lifetime verification counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerificationStats {
    pub successes: u64,
    pub failures: u64,
}

impl VerificationStats {
    /// Success rate in percent, one decimal; 100 when nothing happened yet
    pub fn success_rate(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            return 100.0;
        }
        let rate = self.successes as f64 / total as f64 * 100.0;
        (rate * 10.0).round() / 10.0
    }
}
