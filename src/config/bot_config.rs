use chrono_tz::Tz;
use poise::serenity_prelude::{ChannelId, GuildId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{BotError, Result};

/// Bot configuration, loaded from `{DATA_PATH}/config.json`.
///
/// Every field has a default so a missing file (or a partial one) still
/// yields a runnable bot; features whose channel is unset are skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BotConfig {
    /// Guild the bot serves (used for the startup permission check)
    pub guild_id: Option<u64>,

    /// Channel and category IDs
    pub channels: ChannelConfig,

    /// Name of the role granted on successful verification
    pub member_role_name: String,

    /// IANA timezone the opening hours are evaluated in
    pub timezone: String,

    pub opening_hours: OpeningHoursConfig,

    pub verification: VerificationConfig,

    pub presence: PresenceConfig,

    pub banners: BannerConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            guild_id: None,
            channels: ChannelConfig::default(),
            member_role_name: "👤┇Member".to_string(),
            timezone: "Europe/Berlin".to_string(),
            opening_hours: OpeningHoursConfig::default(),
            verification: VerificationConfig::default(),
            presence: PresenceConfig::default(),
            banners: BannerConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(BotError::ConfigLoad {
                    path: path.to_string(),
                    source: e,
                })
            }
        };

        let config: Self = serde_json::from_str(&content).map_err(|e| BotError::ConfigParse {
            path: path.to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.tz()?;
        self.opening_hours.validate()?;
        if self.verification.max_attempts == 0 {
            return Err(BotError::ConfigValidation {
                message: "verification.max_attempts must be at least 1".to_string(),
            });
        }
        if self.presence.interval_secs == 0 {
            return Err(BotError::ConfigValidation {
                message: "presence.interval_secs must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Parsed timezone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| BotError::ConfigValidation {
                message: format!("Unknown timezone '{}': {}", self.timezone, e),
            })
    }

    pub fn guild(&self) -> Option<GuildId> {
        self.guild_id.map(GuildId::new)
    }
}

/// Channel and category IDs. Unset entries disable the dependent feature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelConfig {
    /// Category new ticket channels are created under
    pub ticket_category: Option<u64>,
    /// Channel holding the create-ticket board
    pub ticket_panel: Option<u64>,
    /// Channel holding the live opening-hours status
    pub opening_hours: Option<u64>,
    /// Audit channel for ticket actions
    pub ticket_log: Option<u64>,
    /// Channel holding the rules panel
    pub rules: Option<u64>,
    /// Channel `/status` broadcasts go to
    pub status: Option<u64>,
}

impl ChannelConfig {
    pub fn ticket_category(&self) -> Option<ChannelId> {
        self.ticket_category.map(ChannelId::new)
    }

    pub fn ticket_panel(&self) -> Option<ChannelId> {
        self.ticket_panel.map(ChannelId::new)
    }

    pub fn opening_hours(&self) -> Option<ChannelId> {
        self.opening_hours.map(ChannelId::new)
    }

    pub fn ticket_log(&self) -> Option<ChannelId> {
        self.ticket_log.map(ChannelId::new)
    }

    pub fn rules(&self) -> Option<ChannelId> {
        self.rules.map(ChannelId::new)
    }

    pub fn status(&self) -> Option<ChannelId> {
        self.status.map(ChannelId::new)
    }
}

/// Support opening windows, as `[open, close)` hours in local time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpeningHoursConfig {
    pub weekday_open: u32,
    pub weekday_close: u32,
    pub weekend_open: u32,
    pub weekend_close: u32,
}

impl Default for OpeningHoursConfig {
    fn default() -> Self {
        Self {
            weekday_open: 8,
            weekday_close: 18,
            weekend_open: 8,
            weekend_close: 20,
        }
    }
}

impl OpeningHoursConfig {
    fn validate(&self) -> Result<()> {
        for (label, open, close) in [
            ("weekday", self.weekday_open, self.weekday_close),
            ("weekend", self.weekend_open, self.weekend_close),
        ] {
            if open >= close || close > 24 {
                return Err(BotError::ConfigValidation {
                    message: format!(
                        "opening_hours: {} window {}-{} is not a valid range",
                        label, open, close
                    ),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerificationConfig {
    /// Wrong codes allowed before the cooldown kicks in
    pub max_attempts: u32,
    pub cooldown_secs: u64,
    /// Lifetime of an issued code
    pub challenge_ttl_secs: u64,
    /// Interval of the stale-attempt sweep
    pub sweep_interval_secs: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            cooldown_secs: 3600,
            challenge_ttl_secs: 600,
            sweep_interval_secs: 2 * 3600,
        }
    }
}

impl VerificationConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn challenge_ttl(&self) -> Duration {
        Duration::from_secs(self.challenge_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresenceConfig {
    pub interval_secs: u64,
    /// Custom status texts, shown in order
    pub statuses: Vec<String>,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            statuses: vec![
                "🎮 ᴏᴘᴘʀᴏ-ɴᴇᴛᴡᴏʀᴋ.ᴅᴇ™".to_string(),
                "💬 Chat, Gaming & Fun".to_string(),
                "⭐ Partner Programs".to_string(),
                "🎲 Events & Challenges".to_string(),
            ],
        }
    }
}

/// Optional banner images shown at the top of embeds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BannerConfig {
    pub tickets: Option<String>,
    pub support_times: Option<String>,
    pub rating: Option<String>,
    pub rules: Option<String>,
    pub status: Option<String>,
}
