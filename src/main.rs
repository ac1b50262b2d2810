use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Discord community bot: support tickets, rules verification and server statistics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding config.json and the persisted records
    #[arg(long, env = "DATA_PATH", default_value = "data")]
    data_path: String,

    /// Force re-sync of slash commands (use when commands aren't showing up)
    #[arg(long, short = 's')]
    sync_commands: bool,

    /// Register commands per-guild instead of globally (faster for testing)
    #[arg(long)]
    guild_commands: bool,

    /// Specific guild ID to sync commands to (for testing)
    #[arg(long)]
    guild_id: Option<u64>,
}

mod commands;
mod config;
mod error;
mod events;
mod hours;
mod logging;
mod managers;
mod messages;
mod platform;
mod presence;
mod scheduler;
mod state;

use config::BotConfig;
use events::{
    handle_channel_create, handle_interaction, handle_member_add, handle_member_remove,
    handle_message, handle_reaction_add, handle_role_create, handle_voice_state_update,
};
use hours::BusinessHours;
use logging::SharedLogBuffer;
use managers::{
    create_shared_announcement_manager, create_shared_rating_manager, run_startup_permission_check,
    SharedStatsManager, SharedTicketManager, SharedVerificationManager, StatsManager,
    TicketManager, TicketSettings, VerificationManager, VerificationSettings,
};
use platform::{SerenityPlatform, SharedPlatform};
use presence::PresenceRotator;
use state::{create_shared_record_store, StatKind};

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared application state
pub struct Data {
    pub config: Arc<BotConfig>,
    pub platform: SharedPlatform,
    pub tickets: SharedTicketManager,
    pub verification: SharedVerificationManager,
    pub stats: SharedStatsManager,
    pub log_buffer: SharedLogBuffer,
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::InteractionCreate { interaction } => {
            if let Err(e) = handle_interaction(ctx, interaction, data).await {
                error!("Failed to handle interaction: {}", e);
            }
        }
        serenity::FullEvent::Message { new_message } => {
            handle_message(new_message, data).await;
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            handle_member_add(new_member, data).await;
        }
        serenity::FullEvent::GuildMemberRemoval { guild_id, user, .. } => {
            handle_member_remove(user, *guild_id, data).await;
        }
        serenity::FullEvent::VoiceStateUpdate { old, new } => {
            handle_voice_state_update(old.as_ref(), new, data).await;
        }
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            handle_reaction_add(add_reaction, data).await;
        }
        serenity::FullEvent::ChannelCreate { channel } => {
            handle_channel_create(channel, data).await;
        }
        serenity::FullEvent::GuildRoleCreate { new } => {
            handle_role_create(new, data).await;
        }
        _ => {}
    }
    Ok(())
}

/// Decode the application ID embedded in the first token segment
fn bot_id_from_token(token: &str) -> Option<String> {
    use base64::Engine;
    let segment = token.split('.').next()?;
    let decoded = base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(segment)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(segment))
        .ok()?;
    String::from_utf8(decoded).ok()
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut terminate =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!("Cannot listen for SIGTERM: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    // Recent log lines for /bot_logs
    let log_buffer = logging::create_log_buffer(logging::DEFAULT_CAPACITY);

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(logging::LogCaptureLayer::new(log_buffer.clone()))
        .init();

    let token = std::env::var("DISCORD_TOKEN")
        .map_err(|_| anyhow::anyhow!("Missing DISCORD_TOKEN environment variable"))?;

    if let Some(id) = bot_id_from_token(&token) {
        info!(
            "Bot ID: {} (configure intents at https://discord.com/developers/applications/{}/bot)",
            id, id
        );
    }

    let config_path = format!("{}/config.json", args.data_path);
    info!("Loading configuration from {}...", config_path);
    let config = Arc::new(BotConfig::load_from_file(&config_path)?);
    let tz = config.tz()?;
    let hours = BusinessHours::from_config(&config)?;
    info!("Opening hours are evaluated in {}", tz);

    let store = create_shared_record_store(&args.data_path);
    store.ensure_root().await?;

    let sync_commands = args.sync_commands;
    let guild_commands = args.guild_commands;
    let target_guild_id = args.guild_id.map(serenity::GuildId::new).or_else(|| config.guild());

    if sync_commands {
        info!("--sync-commands: Will force re-register slash commands");
    }
    if guild_commands {
        info!("--guild-commands: Will register commands per-guild (faster for testing)");
    } else {
        info!("Registering commands globally by default (takes up to 1 hour to propagate)");
    }
    if let Some(gid) = target_guild_id {
        info!("Targeting guild {}", gid);
    }

    let shutdown = CancellationToken::new();
    let setup_shutdown = shutdown.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' invoked by {} (ID: {}) in {}",
                        ctx.command().qualified_name,
                        ctx.author().name,
                        ctx.author().id,
                        ctx.guild_id().map(|g| g.to_string()).unwrap_or_else(|| "DM".to_string())
                    );
                    ctx.data().stats.record(StatKind::CommandsUsed).await;
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' completed for {}",
                        ctx.command().qualified_name,
                        ctx.author().name
                    );
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Error in command '{}': {}", ctx.command().qualified_name, error);
                            let _ = ctx
                                .send(
                                    poise::CreateReply::default()
                                        .content(format!("An error occurred: {}", error))
                                        .ephemeral(true),
                                )
                                .await;
                        }
                        poise::FrameworkError::ArgumentParse { error, input, ctx, .. } => {
                            error!("Argument parse error in '{}': {} (input: {:?})", ctx.command().qualified_name, error, input);
                        }
                        poise::FrameworkError::MissingBotPermissions { missing_permissions, ctx, .. } => {
                            error!("Bot missing permissions for '{}': {:?}", ctx.command().qualified_name, missing_permissions);
                            let _ = ctx.say(format!("Bot is missing permissions: {:?}", missing_permissions)).await;
                        }
                        poise::FrameworkError::MissingUserPermissions { missing_permissions, ctx, .. } => {
                            error!("User {} missing permissions for '{}': {:?}", ctx.author().name, ctx.command().qualified_name, missing_permissions);
                        }
                        poise::FrameworkError::GuildOnly { ctx, .. } => {
                            error!("Command '{}' is guild-only, used in DM by {}", ctx.command().qualified_name, ctx.author().name);
                        }
                        other => {
                            error!("Other framework error: {}", other);
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            let config = config.clone();
            let store = store.clone();
            let log_buffer = log_buffer.clone();
            let shutdown = setup_shutdown.clone();

            Box::pin(async move {
                info!("Bot logged in as: {}", ready.user.name);

                let platform: SharedPlatform =
                    Arc::new(SerenityPlatform::new(ctx.http.clone(), ctx.cache.clone()));
                let announcements =
                    create_shared_announcement_manager(platform.clone(), store.clone()).await;
                let ratings = create_shared_rating_manager(store.clone()).await;
                let tickets: SharedTicketManager = Arc::new(
                    TicketManager::load(
                        platform.clone(),
                        store.clone(),
                        ratings,
                        announcements.clone(),
                        hours,
                        TicketSettings::from_config(&config),
                    )
                    .await,
                );
                let verification: SharedVerificationManager = Arc::new(
                    VerificationManager::load(
                        platform.clone(),
                        store.clone(),
                        announcements,
                        VerificationSettings::from_config(&config),
                    )
                    .await,
                );
                let stats: SharedStatsManager = Arc::new(StatsManager::load(store.clone(), tz).await);

                let guilds_to_register: Vec<serenity::GuildId> = match target_guild_id {
                    Some(gid) => vec![gid],
                    None => ready.guilds.iter().map(|g| g.id).collect(),
                };

                match target_guild_id.or_else(|| guilds_to_register.first().copied()) {
                    Some(guild_id) => {
                        run_startup_permission_check(ctx.http.as_ref(), guild_id, &config.member_role_name)
                            .await;
                    }
                    None => warn!("Bot is not in any guilds - skipping permission check"),
                }

                if guild_commands || sync_commands {
                    for guild_id in &guilds_to_register {
                        info!("Registering commands to guild: {}", guild_id);
                        if let Err(e) = poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            *guild_id,
                        ).await {
                            error!("Failed to register commands for guild {}: {}", guild_id, e);
                        } else {
                            info!("Successfully registered {} commands for guild {}",
                                  framework.options().commands.len(), guild_id);
                        }
                    }
                } else {
                    info!("Registering commands globally...");
                    if let Err(e) = poise::builtins::register_globally(
                        ctx,
                        &framework.options().commands,
                    ).await {
                        error!("Failed to register commands globally: {}", e);
                    } else {
                        info!("Successfully registered {} commands globally (may take up to 1 hour to propagate)",
                              framework.options().commands.len());
                    }
                }

                // Answered rating requests stay read-only across restarts
                tickets.reconcile().await;

                let boards = [
                    ("ticket panel", tickets.publish_panel().await),
                    ("opening hours", tickets.refresh_opening_hours().await),
                    ("rules panel", verification.publish_rules_panel().await),
                ];
                for (name, result) in boards {
                    match result {
                        Ok(Some(publication)) => {
                            info!("Published {} as message {}", name, publication.message_id())
                        }
                        Ok(None) => info!("No channel configured for the {}, skipping", name),
                        Err(e) => warn!("Failed to publish {}: {}", name, e),
                    }
                }

                scheduler::start(
                    ctx.clone(),
                    scheduler::Jobs {
                        tickets: tickets.clone(),
                        verification: verification.clone(),
                        stats: stats.clone(),
                        presence: Arc::new(PresenceRotator::new(config.presence.statuses.clone())),
                        presence_interval: std::time::Duration::from_secs(config.presence.interval_secs),
                        sweep_interval: config.verification.sweep_interval(),
                    },
                    &shutdown,
                );

                Ok(Data {
                    config,
                    platform,
                    tickets,
                    verification,
                    stats,
                    log_buffer,
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MEMBERS;

    let privileged_intents: Vec<&str> = vec![
        if intents.contains(serenity::GatewayIntents::MESSAGE_CONTENT) {
            Some("MESSAGE_CONTENT")
        } else {
            None
        },
        if intents.contains(serenity::GatewayIntents::GUILD_MEMBERS) {
            Some("GUILD_MEMBERS")
        } else {
            None
        },
    ]
    .into_iter()
    .flatten()
    .collect();

    info!("Requesting privileged intents: {:?}", privileged_intents);

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("Shutdown requested, stopping background jobs and shards");
        shutdown.cancel();
        shard_manager.shutdown_all().await;
    });

    info!("Starting bot...");
    if let Err(e) = client.start().await {
        let err_str = e.to_string();
        if err_str.contains("Disallowed") || err_str.contains("intents") {
            error!("Failed to start bot: {}", e);
            error!("The following privileged intents need to be enabled in the Discord Developer Portal:");
            for intent in &privileged_intents {
                error!("  - {}", intent);
            }
            error!("Go to https://discord.com/developers/applications -> Your App -> Bot -> Privileged Gateway Intents");
            return Err(anyhow::anyhow!(
                "Disallowed gateway intents. Enable these in Discord Developer Portal: {:?}",
                privileged_intents
            ));
        }
        return Err(e.into());
    }
    warn!("Bot ended.");

    Ok(())
}
