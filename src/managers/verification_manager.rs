use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use poise::serenity_prelude::{ChannelId, GuildId, RoleId, UserId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::BotConfig;
use crate::error::Result;
use crate::managers::announcement_manager::{Publication, SharedAnnouncementManager};
use crate::messages;
use crate::platform::SharedPlatform;
use crate::state::{
    Admissibility, AnnouncementSlot, BlockList, Challenge, Partition, SharedRecordStore,
    VerificationStats, VerificationTracker,
};

#[derive(Debug, Clone)]
pub struct VerificationSettings {
    pub member_role: String,
    pub max_attempts: u32,
    pub cooldown: Duration,
    pub challenge_ttl: Duration,
    pub rules_channel: Option<ChannelId>,
    pub banner: Option<String>,
}

impl VerificationSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            member_role: config.member_role_name.clone(),
            max_attempts: config.verification.max_attempts,
            cooldown: config.verification.cooldown(),
            challenge_ttl: config.verification.challenge_ttl(),
            rules_channel: config.channels.rules(),
            banner: config.banners.rules.clone(),
        }
    }
}

/// Result of pressing "I Accept All Rules"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    AlreadyVerified,
    Denied(Admissibility),
    CodeIssued { code: String },
    /// The member role does not exist in the guild
    Unavailable,
}

impl AcceptOutcome {
    pub fn reply(&self) -> String {
        match self {
            AcceptOutcome::AlreadyVerified => "✅ Already verified!".to_string(),
            AcceptOutcome::Denied(reason) => format!("⛔ {}", reason.reason()),
            AcceptOutcome::CodeIssued { code } => format!("Your verification code: `{}`", code),
            AcceptOutcome::Unavailable => {
                "Verification is currently not available. Please contact a staff member.".to_string()
            }
        }
    }
}

/// Result of pressing "Enter Code"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeEntryOutcome {
    Open,
    NotYourSession,
    Expired,
}

/// Result of submitting the code modal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeOutcome {
    Verified,
    WrongCode { attempts: u32, max_attempts: u32 },
    NotYourSession,
    Expired,
    Unavailable,
}

impl CodeOutcome {
    pub fn reply(&self) -> String {
        match self {
            CodeOutcome::Verified => "✅ Verified!".to_string(),
            CodeOutcome::WrongCode {
                attempts,
                max_attempts,
            } => format!("❌ Wrong code. Attempt {}/{}", attempts, max_attempts),
            CodeOutcome::NotYourSession => not_your_session(),
            CodeOutcome::Expired => expired_session(),
            CodeOutcome::Unavailable => AcceptOutcome::Unavailable.reply(),
        }
    }
}

pub fn not_your_session() -> String {
    "❌ Not your verification!".to_string()
}

pub fn expired_session() -> String {
    "⌛ This verification has expired. Please accept the rules again.".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub stale_records: usize,
    pub expired_challenges: usize,
}

/// Gates the member role behind a one-time code with attempt limiting
pub struct VerificationManager {
    platform: SharedPlatform,
    store: SharedRecordStore,
    announcements: SharedAnnouncementManager,
    settings: VerificationSettings,

    tracker: Mutex<VerificationTracker>,

    /// Live challenges (owner -> challenge); never persisted
    challenges: DashMap<UserId, Challenge>,

    stats: Mutex<VerificationStats>,
}

impl VerificationManager {
    pub async fn load(
        platform: SharedPlatform,
        store: SharedRecordStore,
        announcements: SharedAnnouncementManager,
        settings: VerificationSettings,
    ) -> Self {
        let blocked: BlockList = store.load_or_default(Partition::VerificationBlocks).await;
        if !blocked.users.is_empty() {
            info!("{} users are blocked from verification", blocked.users.len());
        }
        let tracker = VerificationTracker::new(settings.max_attempts, settings.cooldown)
            .with_blocked(&blocked);

        Self {
            platform,
            store,
            announcements,
            settings,
            tracker: Mutex::new(tracker),
            challenges: DashMap::new(),
            stats: Mutex::new(VerificationStats::default()),
        }
    }

    pub async fn accept_rules(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        member_roles: &[RoleId],
    ) -> Result<AcceptOutcome> {
        self.accept_rules_at(guild_id, user_id, member_roles, Utc::now())
            .await
    }

    /// Issue a code to `user_id` if they are not a member yet and may try
    pub async fn accept_rules_at(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        member_roles: &[RoleId],
        now: DateTime<Utc>,
    ) -> Result<AcceptOutcome> {
        let Some(role_id) = self.member_role(guild_id).await? else {
            return Ok(AcceptOutcome::Unavailable);
        };
        if member_roles.contains(&role_id) {
            return Ok(AcceptOutcome::AlreadyVerified);
        }

        let admissibility = self.tracker.lock().can_attempt_at(user_id, now);
        if !admissibility.is_admissible() {
            debug!("Verification for {} denied: {}", user_id, admissibility.reason());
            return Ok(AcceptOutcome::Denied(admissibility));
        }

        let challenge = Challenge::issue(user_id, now);
        let code = challenge.code.clone();
        self.challenges.insert(user_id, challenge);
        debug!("Issued verification code to {}", user_id);
        Ok(AcceptOutcome::CodeIssued { code })
    }

    pub fn open_code_entry(&self, owner: UserId, actor: UserId) -> CodeEntryOutcome {
        self.open_code_entry_at(owner, actor, Utc::now())
    }

    pub fn open_code_entry_at(
        &self,
        owner: UserId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> CodeEntryOutcome {
        if actor != owner {
            return CodeEntryOutcome::NotYourSession;
        }
        match self.live_challenge(owner, now) {
            Some(_) => CodeEntryOutcome::Open,
            None => CodeEntryOutcome::Expired,
        }
    }

    pub async fn submit_code(
        &self,
        guild_id: GuildId,
        owner: UserId,
        actor: UserId,
        input: &str,
    ) -> Result<CodeOutcome> {
        self.submit_code_at(guild_id, owner, actor, input, Utc::now())
            .await
    }

    /// Check a submitted code. A wrong code counts as an attempt but leaves
    /// the challenge usable until it expires.
    pub async fn submit_code_at(
        &self,
        guild_id: GuildId,
        owner: UserId,
        actor: UserId,
        input: &str,
        now: DateTime<Utc>,
    ) -> Result<CodeOutcome> {
        if actor != owner {
            return Ok(CodeOutcome::NotYourSession);
        }
        let Some(challenge) = self.live_challenge(owner, now) else {
            return Ok(CodeOutcome::Expired);
        };

        if !challenge.matches(input) {
            let attempts = self.tracker.lock().record_attempt_at(owner, now);
            self.stats.lock().failures += 1;
            info!(
                "Wrong verification code from {} (attempt {}/{})",
                owner, attempts, self.settings.max_attempts
            );
            return Ok(CodeOutcome::WrongCode {
                attempts,
                max_attempts: self.settings.max_attempts,
            });
        }

        let Some(role_id) = self.member_role(guild_id).await? else {
            return Ok(CodeOutcome::Unavailable);
        };
        self.platform
            .add_role(guild_id, owner, role_id, "Verified")
            .await?;

        self.challenges.remove(&owner);
        let was_blocked = {
            let mut tracker = self.tracker.lock();
            let was_blocked = tracker.is_blocked(owner);
            tracker.reset(owner);
            was_blocked
        };
        if was_blocked {
            self.persist_blocks().await;
        }
        self.stats.lock().successes += 1;

        info!("User {} verified", owner);
        self.refresh_rules_panel().await;
        Ok(CodeOutcome::Verified)
    }

    /// Drop stale attempt records and expired challenges
    pub fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let stale_records = self.tracker.lock().sweep_at(now);

        let ttl = self.settings.challenge_ttl;
        let before = self.challenges.len();
        self.challenges
            .retain(|_, challenge| !challenge.is_expired_at(now, ttl));
        let expired_challenges = before - self.challenges.len();

        let report = SweepReport {
            stale_records,
            expired_challenges,
        };
        if report != SweepReport::default() {
            info!(
                "Cleaned up {} verification records and {} expired codes",
                stale_records, expired_challenges
            );
        }
        report
    }

    /// Bar a user from verifying; returns false if already blocked
    pub async fn block(&self, user_id: UserId) -> bool {
        let changed = self.tracker.lock().block(user_id);
        if changed {
            self.challenges.remove(&user_id);
            self.persist_blocks().await;
            info!("Blocked {} from verification", user_id);
        }
        changed
    }

    pub async fn unblock(&self, user_id: UserId) -> bool {
        let changed = self.tracker.lock().unblock(user_id);
        if changed {
            self.persist_blocks().await;
            info!("Unblocked {} from verification", user_id);
        }
        changed
    }

    #[cfg(test)]
    pub fn is_blocked(&self, user_id: UserId) -> bool {
        self.tracker.lock().is_blocked(user_id)
    }

    #[cfg(test)]
    pub fn attempts(&self, user_id: UserId) -> u32 {
        self.tracker.lock().attempts(user_id)
    }

    pub fn stats(&self) -> VerificationStats {
        *self.stats.lock()
    }

    /// Keep the rules panel (with current stats) in the rules channel
    pub async fn publish_rules_panel(&self) -> Result<Option<Publication>> {
        let Some(channel_id) = self.settings.rules_channel else {
            return Ok(None);
        };
        let panel = messages::rules_panel(&self.stats(), self.settings.banner.as_deref());
        self.announcements
            .upsert(AnnouncementSlot::RulesPanel, channel_id, &panel)
            .await
            .map(Some)
    }

    /// Republish the rules panel so its footer shows the current stats
    pub async fn refresh_rules_panel(&self) {
        if let Err(e) = self.publish_rules_panel().await {
            warn!("Failed to refresh rules panel: {}", e);
        }
    }

    fn live_challenge(&self, owner: UserId, now: DateTime<Utc>) -> Option<Challenge> {
        let challenge = self.challenges.get(&owner).map(|c| c.clone())?;
        if challenge.is_expired_at(now, self.settings.challenge_ttl) {
            self.challenges.remove(&owner);
            return None;
        }
        Some(challenge)
    }

    async fn member_role(&self, guild_id: GuildId) -> Result<Option<RoleId>> {
        let role = self
            .platform
            .find_role(guild_id, &self.settings.member_role)
            .await?;
        if role.is_none() {
            error!(
                "Member role '{}' not found in guild {}",
                self.settings.member_role, guild_id
            );
        }
        Ok(role)
    }

    async fn persist_blocks(&self) {
        let blocks = self.tracker.lock().block_list();
        if let Err(e) = self.store.save(Partition::VerificationBlocks, &blocks).await {
            warn!("Failed to save verification blocks: {}", e);
        }
    }
}

/// Shared verification manager type
pub type SharedVerificationManager = Arc<VerificationManager>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managers::announcement_manager::AnnouncementManager;
    use crate::platform::mock::{Call, RecordingPlatform};
    use crate::state::create_shared_record_store;

    const GUILD: u64 = 1;
    const MEMBER_ROLE: u64 = 500;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn t0() -> DateTime<Utc> {
        utc("2025-10-20T12:00:00Z")
    }

    fn settings() -> VerificationSettings {
        VerificationSettings {
            member_role: "👤┇Member".to_string(),
            max_attempts: 3,
            cooldown: Duration::from_secs(3600),
            challenge_ttl: Duration::from_secs(600),
            rules_channel: Some(ChannelId::new(300)),
            banner: None,
        }
    }

    async fn setup(
        store: SharedRecordStore,
    ) -> (Arc<RecordingPlatform>, VerificationManager) {
        let platform = Arc::new(RecordingPlatform::new().with_role("👤┇Member", MEMBER_ROLE));
        let announcements =
            Arc::new(AnnouncementManager::load(platform.clone(), store.clone()).await);
        let manager =
            VerificationManager::load(platform.clone(), store, announcements, settings()).await;
        (platform, manager)
    }

    async fn issue(manager: &VerificationManager, user: UserId, now: DateTime<Utc>) -> String {
        match manager
            .accept_rules_at(GuildId::new(GUILD), user, &[], now)
            .await
            .unwrap()
        {
            AcceptOutcome::CodeIssued { code } => code,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_correct_code_grants_role() {
        let dir = tempfile::tempdir().unwrap();
        let (platform, manager) = setup(create_shared_record_store(dir.path())).await;
        let user = UserId::new(7);

        let code = issue(&manager, user, t0()).await;
        assert_eq!(code.len(), 8);
        assert_eq!(manager.open_code_entry_at(user, user, t0()), CodeEntryOutcome::Open);

        let input = format!("  {}  ", code.to_uppercase());
        let outcome = manager
            .submit_code_at(GuildId::new(GUILD), user, user, &input, t0())
            .await
            .unwrap();
        assert_eq!(outcome, CodeOutcome::Verified);
        assert!(platform.calls().contains(&Call::AddRole {
            user_id: user,
            role_id: RoleId::new(MEMBER_ROLE)
        }));
        assert_eq!(manager.stats().successes, 1);

        // The challenge is consumed
        assert_eq!(
            manager
                .submit_code_at(GuildId::new(GUILD), user, user, &code, t0())
                .await
                .unwrap(),
            CodeOutcome::Expired
        );
    }

    #[tokio::test]
    async fn test_existing_member_needs_no_code() {
        let dir = tempfile::tempdir().unwrap();
        let (_platform, manager) = setup(create_shared_record_store(dir.path())).await;
        let outcome = manager
            .accept_rules_at(
                GuildId::new(GUILD),
                UserId::new(7),
                &[RoleId::new(MEMBER_ROLE)],
                t0(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, AcceptOutcome::AlreadyVerified);
        assert_eq!(manager.open_code_entry_at(UserId::new(7), UserId::new(7), t0()), CodeEntryOutcome::Expired);
    }

    #[tokio::test]
    async fn test_other_user_cannot_use_session() {
        let dir = tempfile::tempdir().unwrap();
        let (platform, manager) = setup(create_shared_record_store(dir.path())).await;
        let owner = UserId::new(7);
        let intruder = UserId::new(8);
        let code = issue(&manager, owner, t0()).await;

        assert_eq!(
            manager.open_code_entry_at(owner, intruder, t0()),
            CodeEntryOutcome::NotYourSession
        );
        assert_eq!(
            manager
                .submit_code_at(GuildId::new(GUILD), owner, intruder, &code, t0())
                .await
                .unwrap(),
            CodeOutcome::NotYourSession
        );
        assert_eq!(manager.attempts(owner), 0);
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_code_keeps_challenge() {
        let dir = tempfile::tempdir().unwrap();
        let (_platform, manager) = setup(create_shared_record_store(dir.path())).await;
        let user = UserId::new(7);
        let code = issue(&manager, user, t0()).await;

        let mut wrong = code.clone();
        let last = if wrong.ends_with('a') { "b" } else { "a" };
        wrong.replace_range(7..8, last);

        let outcome = manager
            .submit_code_at(GuildId::new(GUILD), user, user, &wrong, t0())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CodeOutcome::WrongCode {
                attempts: 1,
                max_attempts: 3
            }
        );
        assert_eq!(outcome.reply(), "❌ Wrong code. Attempt 1/3");

        let retry = manager
            .submit_code_at(GuildId::new(GUILD), user, user, &code, t0())
            .await
            .unwrap();
        assert_eq!(retry, CodeOutcome::Verified);
        assert_eq!(manager.attempts(user), 0);
    }

    #[tokio::test]
    async fn test_cooldown_after_max_failures() {
        let dir = tempfile::tempdir().unwrap();
        let (_platform, manager) = setup(create_shared_record_store(dir.path())).await;
        let user = UserId::new(7);
        issue(&manager, user, t0()).await;

        for _ in 0..3 {
            manager
                .submit_code_at(GuildId::new(GUILD), user, user, "nope", t0())
                .await
                .unwrap();
        }

        let later = t0() + chrono::Duration::minutes(30);
        let outcome = manager
            .accept_rules_at(GuildId::new(GUILD), user, &[], later)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AcceptOutcome::Denied(Admissibility::Cooldown {
                remaining_minutes: 30
            })
        );
        assert_eq!(outcome.reply(), "⛔ Cooldown active. Try again in 30 minutes");

        let after = t0() + chrono::Duration::minutes(61);
        assert!(matches!(
            manager
                .accept_rules_at(GuildId::new(GUILD), user, &[], after)
                .await
                .unwrap(),
            AcceptOutcome::CodeIssued { .. }
        ));
        assert_eq!(manager.attempts(user), 0);
        assert_eq!(manager.stats().failures, 3);
    }

    #[tokio::test]
    async fn test_challenge_expires() {
        let dir = tempfile::tempdir().unwrap();
        let (_platform, manager) = setup(create_shared_record_store(dir.path())).await;
        let user = UserId::new(7);
        let code = issue(&manager, user, t0()).await;

        let late = t0() + chrono::Duration::minutes(10);
        assert_eq!(manager.open_code_entry_at(user, user, late), CodeEntryOutcome::Expired);
        assert_eq!(
            manager
                .submit_code_at(GuildId::new(GUILD), user, user, &code, late)
                .await
                .unwrap(),
            CodeOutcome::Expired
        );
    }

    #[tokio::test]
    async fn test_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let (_platform, manager) = setup(create_shared_record_store(dir.path())).await;
        let stale = UserId::new(7);
        let fresh = UserId::new(8);

        issue(&manager, stale, t0()).await;
        manager
            .submit_code_at(GuildId::new(GUILD), stale, stale, "nope", t0())
            .await
            .unwrap();
        let later = t0() + chrono::Duration::minutes(90);
        issue(&manager, fresh, later).await;

        let report = manager.sweep_at(later);
        assert_eq!(
            report,
            SweepReport {
                stale_records: 1,
                expired_challenges: 1
            }
        );
        assert_eq!(manager.attempts(stale), 0);
        assert_eq!(manager.open_code_entry_at(fresh, fresh, later), CodeEntryOutcome::Open);
    }

    #[tokio::test]
    async fn test_blocks_persist() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_shared_record_store(dir.path());
        let user = UserId::new(7);
        {
            let (_platform, manager) = setup(store.clone()).await;
            issue(&manager, user, t0()).await;
            assert!(manager.block(user).await);
            assert!(!manager.block(user).await);
            // Blocking discards the live challenge
            assert_eq!(manager.open_code_entry_at(user, user, t0()), CodeEntryOutcome::Expired);
        }

        let (_platform, manager) = setup(store.clone()).await;
        assert!(manager.is_blocked(user));
        assert_eq!(
            manager
                .accept_rules_at(GuildId::new(GUILD), user, &[], t0())
                .await
                .unwrap(),
            AcceptOutcome::Denied(Admissibility::Blocked)
        );

        assert!(manager.unblock(user).await);
        let (_platform, manager) = setup(store).await;
        assert!(!manager.is_blocked(user));
    }

    #[tokio::test]
    async fn test_verification_refreshes_rules_panel() {
        let dir = tempfile::tempdir().unwrap();
        let (platform, manager) = setup(create_shared_record_store(dir.path())).await;
        let rules = ChannelId::new(300);
        let user = UserId::new(7);
        let code = issue(&manager, user, t0()).await;
        manager
            .submit_code_at(GuildId::new(GUILD), user, user, "wrong", t0())
            .await
            .unwrap();
        assert!(platform.sent_to(rules).is_empty());

        manager
            .submit_code_at(GuildId::new(GUILD), user, user, &code, t0())
            .await
            .unwrap();

        // Posted by the successful verification itself
        let panels = platform.sent_to(rules);
        assert_eq!(panels.len(), 1);
        assert_eq!(
            panels[0].notice.as_ref().unwrap().footer.as_deref(),
            Some("Total Verifications: 1 • Success Rate: 50%")
        );

        // Later refreshes edit the same message
        manager.refresh_rules_panel().await;
        assert_eq!(platform.sent_to(rules).len(), 1);
    }
}
