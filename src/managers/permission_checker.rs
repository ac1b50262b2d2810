use poise::serenity_prelude::{GuildId, Http, Permissions};
use tracing::{error, info, warn};

/// A single permission with its status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionStatus {
    pub name: &'static str,
    pub description: &'static str,
    pub has_permission: bool,
}

/// All permissions the bot needs in the configured guild
pub fn get_required_permissions() -> Vec<(&'static str, &'static str, Permissions)> {
    vec![
        ("VIEW_CHANNEL", "See channels and categories", Permissions::VIEW_CHANNEL),
        ("SEND_MESSAGES", "Post panels, notices and logs", Permissions::SEND_MESSAGES),
        ("EMBED_LINKS", "Send rich embeds in messages", Permissions::EMBED_LINKS),
        (
            "READ_MESSAGE_HISTORY",
            "Find existing panels after a restart",
            Permissions::READ_MESSAGE_HISTORY,
        ),
        ("MANAGE_CHANNELS", "Create and delete ticket channels", Permissions::MANAGE_CHANNELS),
        ("MANAGE_ROLES", "Grant the member role after verification", Permissions::MANAGE_ROLES),
    ]
}

/// Result of a permission check for the configured guild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildPermissionCheck {
    pub guild_id: GuildId,
    pub guild_name: String,
    pub permission_statuses: Vec<PermissionStatus>,
    pub has_all_permissions: bool,
    pub bot_role_position: Option<u16>,
    pub bot_role_name: Option<String>,
    pub member_role_name: String,
    pub member_role_position: Option<u16>,
    /// The bot's top role sits above the member role, so it can grant it
    pub role_hierarchy_ok: bool,
}

impl GuildPermissionCheck {
    pub fn is_ok(&self) -> bool {
        self.has_all_permissions && self.role_hierarchy_ok
    }

    pub fn missing(&self) -> Vec<&'static str> {
        self.permission_statuses
            .iter()
            .filter(|s| !s.has_permission)
            .map(|s| s.name)
            .collect()
    }
}

/// Grade the bot's guild permissions and role position.
/// Administrator implies every permission.
pub fn evaluate(
    guild_id: GuildId,
    guild_name: impl Into<String>,
    bot_permissions: Permissions,
    bot_role: Option<(String, u16)>,
    member_role_name: impl Into<String>,
    member_role_position: Option<u16>,
) -> GuildPermissionCheck {
    let is_admin = bot_permissions.contains(Permissions::ADMINISTRATOR);

    let permission_statuses: Vec<PermissionStatus> = get_required_permissions()
        .into_iter()
        .map(|(name, description, permission)| PermissionStatus {
            name,
            description,
            has_permission: is_admin || bot_permissions.contains(permission),
        })
        .collect();
    let has_all_permissions = permission_statuses.iter().all(|s| s.has_permission);

    let bot_role_position = bot_role.as_ref().map(|(_, pos)| *pos);
    let role_hierarchy_ok = match (bot_role_position, member_role_position) {
        (Some(bot_pos), Some(member_pos)) => bot_pos > member_pos,
        // No member role means nothing to grant, the verification flow reports it
        (Some(_), None) => true,
        _ => false,
    };

    GuildPermissionCheck {
        guild_id,
        guild_name: guild_name.into(),
        permission_statuses,
        has_all_permissions,
        bot_role_position,
        bot_role_name: bot_role.map(|(name, _)| name),
        member_role_name: member_role_name.into(),
        member_role_position,
        role_hierarchy_ok,
    }
}

/// Check bot permissions for a specific guild
pub async fn check_guild_permissions(
    http: &Http,
    guild_id: GuildId,
    member_role_name: &str,
) -> Result<GuildPermissionCheck, String> {
    let guild = guild_id
        .to_partial_guild(http)
        .await
        .map_err(|e| format!("Failed to fetch guild {}: {}", guild_id, e))?;

    let bot_user = http
        .get_current_user()
        .await
        .map_err(|e| format!("Failed to get bot user: {}", e))?;

    let bot_member = guild
        .member(http, bot_user.id)
        .await
        .map_err(|e| format!("Failed to get bot member in guild {}: {}", guild_id, e))?;

    // Base permissions for a server-wide check
    #[allow(deprecated)]
    let bot_permissions = guild.member_permissions(&bot_member);

    let bot_role = bot_member
        .roles
        .iter()
        .filter_map(|role_id| guild.roles.get(role_id))
        .max_by_key(|role| role.position)
        .map(|role| (role.name.clone(), role.position));

    let member_role_position = guild
        .roles
        .values()
        .find(|role| role.name == member_role_name)
        .map(|role| role.position);

    Ok(evaluate(
        guild_id,
        guild.name.clone(),
        bot_permissions,
        bot_role,
        member_role_name,
        member_role_position,
    ))
}

/// Log permission check results with appropriate log levels
pub fn log_permission_check_result(check: &GuildPermissionCheck) {
    info!("========================================");
    info!("       BOT PERMISSION CHECK");
    info!("========================================");
    info!("Guild: '{}' (ID: {})", check.guild_name, check.guild_id);

    match (&check.bot_role_name, check.bot_role_position) {
        (Some(name), Some(position)) => {
            info!("Bot's highest role: '{}' (position {})", name, position)
        }
        _ => warn!("Bot has no roles assigned!"),
    }

    info!("Server Permissions:");
    for status in &check.permission_statuses {
        if status.has_permission {
            info!("  [YES] {:<20} - {}", status.name, status.description);
        } else {
            error!("  [NO]  {:<20} - {}", status.name, status.description);
        }
    }

    info!("Role Hierarchy:");
    match check.member_role_position {
        None => warn!(
            "  [WARN] Member role '{}' does not exist, verification cannot grant it",
            check.member_role_name
        ),
        Some(_) if check.role_hierarchy_ok => info!(
            "  [OK] Bot role is above '{}'",
            check.member_role_name
        ),
        Some(position) => {
            error!(
                "  [FAIL] Bot role is NOT above '{}' (bot: {}, member role: {})",
                check.member_role_name,
                check.bot_role_position.unwrap_or(0),
                position
            );
            error!("  Fix: Go to Discord Server Settings > Roles > drag bot's role higher");
        }
    }

    if check.is_ok() {
        info!("Status: ALL CHECKS PASSED");
    } else {
        error!("Status: ISSUES DETECTED - Some operations may fail!");
        if !check.has_all_permissions {
            error!("  Missing permissions: {}", check.missing().join(", "));
            error!("  Fix: Go to Discord Server Settings > Roles > Bot's role > enable missing permissions");
        }
    }
    info!("========================================");
}

/// Run a full permission check and log results.
/// Returns true if everything is in place.
pub async fn run_startup_permission_check(
    http: &Http,
    guild_id: GuildId,
    member_role_name: &str,
) -> bool {
    match check_guild_permissions(http, guild_id, member_role_name).await {
        Ok(check) => {
            log_permission_check_result(&check);
            check.is_ok()
        }
        Err(e) => {
            error!("Failed to check permissions for guild {}: {}", guild_id, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required() -> Permissions {
        Permissions::VIEW_CHANNEL
            | Permissions::SEND_MESSAGES
            | Permissions::EMBED_LINKS
            | Permissions::READ_MESSAGE_HISTORY
            | Permissions::MANAGE_CHANNELS
            | Permissions::MANAGE_ROLES
    }

    #[test]
    fn test_all_permissions_present() {
        let check = evaluate(
            GuildId::new(1),
            "Guild",
            required(),
            Some(("Bot".to_string(), 10)),
            "Member",
            Some(3),
        );
        assert!(check.is_ok());
        assert!(check.missing().is_empty());
    }

    #[test]
    fn test_missing_permissions_are_listed() {
        let perms = required() - Permissions::MANAGE_ROLES - Permissions::READ_MESSAGE_HISTORY;
        let check = evaluate(
            GuildId::new(1),
            "Guild",
            perms,
            Some(("Bot".to_string(), 10)),
            "Member",
            Some(3),
        );
        assert!(!check.has_all_permissions);
        assert_eq!(check.missing(), vec!["READ_MESSAGE_HISTORY", "MANAGE_ROLES"]);
    }

    #[test]
    fn test_administrator_implies_everything() {
        let check = evaluate(
            GuildId::new(1),
            "Guild",
            Permissions::ADMINISTRATOR,
            Some(("Bot".to_string(), 10)),
            "Member",
            Some(3),
        );
        assert!(check.has_all_permissions);
    }

    #[test]
    fn test_role_hierarchy() {
        let below = evaluate(
            GuildId::new(1),
            "Guild",
            required(),
            Some(("Bot".to_string(), 2)),
            "Member",
            Some(3),
        );
        assert!(!below.role_hierarchy_ok);

        let equal = evaluate(
            GuildId::new(1),
            "Guild",
            required(),
            Some(("Bot".to_string(), 3)),
            "Member",
            Some(3),
        );
        assert!(!equal.role_hierarchy_ok);

        let no_bot_role = evaluate(GuildId::new(1), "Guild", required(), None, "Member", Some(3));
        assert!(!no_bot_role.role_hierarchy_ok);

        let no_member_role = evaluate(
            GuildId::new(1),
            "Guild",
            required(),
            Some(("Bot".to_string(), 2)),
            "Member",
            None,
        );
        assert!(no_member_role.role_hierarchy_ok);
    }
}
