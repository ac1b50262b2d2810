pub mod bot_config;

pub use bot_config::{
    BannerConfig, BotConfig, ChannelConfig, OpeningHoursConfig, PresenceConfig,
    VerificationConfig,
};
