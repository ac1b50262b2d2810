use tracing::{info, Level};

use crate::logging::render_block;
use crate::messages;
use crate::platform::discord::create_reply;
use crate::platform::Render;
use crate::{Context, Error};

/// Discord's message length limit, minus the code fence
const LOG_BLOCK_LIMIT: usize = 2000 - 8;

/// Check if the bot is running
#[poise::command(prefix_command, slash_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    info!("Ping command called by {}", ctx.author().name);
    ctx.send(
        poise::CreateReply::default()
            .content("🏓 Pong! Bot is working!")
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Show help information
#[poise::command(prefix_command, slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    ctx.send(create_reply(&Render::notice(messages::help()), true))
        .await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum LogLevel {
    #[name = "Error"]
    Error,
    #[name = "Warn"]
    Warn,
    #[name = "Info"]
    Info,
    #[name = "Debug"]
    Debug,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
        }
    }
}

/// Show the most recent log lines
#[poise::command(
    slash_command,
    guild_only,
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn bot_logs(
    ctx: Context<'_>,
    #[description = "Number of lines (default 20)"]
    #[min = 1]
    #[max = 100]
    count: Option<usize>,
    #[description = "Lowest level to include (default Info)"] min_level: Option<LogLevel>,
) -> Result<(), Error> {
    let level: Level = min_level.unwrap_or(LogLevel::Info).into();
    let entries = ctx
        .data()
        .log_buffer
        .get_recent(count.unwrap_or(20), level);

    let content = if entries.is_empty() {
        "No log lines captured yet.".to_string()
    } else {
        format!("```\n{}\n```", render_block(&entries, LOG_BLOCK_LIMIT))
    };

    ctx.send(poise::CreateReply::default().content(content).ephemeral(true))
        .await?;
    Ok(())
}
