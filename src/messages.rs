use chrono::{DateTime, NaiveDate, Utc};
use poise::serenity_prelude::{ChannelId, UserId};

use crate::platform::render::{
    COLOUR_BLUE, COLOUR_BLURPLE, COLOUR_GOLD, COLOUR_GREEN, COLOUR_ORANGE, COLOUR_RED,
};
use crate::platform::{Controls, Notice, Render, UserSummary};
use crate::managers::StatsReport;
use crate::state::{DailyStats, RatingAggregate, StatKind, VerificationStats};

const STATUS_FOOTER: &str = "Powered by guildkeeper";

/// "⭐⭐⭐✨" for 3.5
pub fn average_stars(average: f64) -> String {
    let mut stars = "⭐".repeat(average.trunc() as usize);
    if average.fract() >= 0.5 {
        stars.push('✨');
    }
    stars
}

pub fn rating_label(stars: u8) -> String {
    let word = match stars {
        5 => "Excellent",
        4 => "Good",
        3 => "Average",
        2 => "Poor",
        _ => "Very Poor",
    };
    format!("{} {}", "⭐".repeat(usize::from(stars)), word)
}

/// Placeholder of a rating select that was already answered
pub fn submitted_placeholder(stars: u8, average: f64, count: u64) -> String {
    format!(
        "Rated {}/5 • Average {:.1}/5 ({} ratings)",
        stars, average, count
    )
}

pub fn ticket_panel(banner: Option<&str>) -> Render {
    Render::notice(
        Notice::new(
            "Ticket System",
            "Here you have the opportunity to create a ticket so that a dedicated team member \
            can take care of your concern as quickly as possible. We are here to help and \
            support you to assist you in the best possible way.",
            COLOUR_BLURPLE,
        )
        .image(banner),
    )
    .with_controls(Controls::TicketPanel)
}

pub fn support_closed(schedule: &str, banner: Option<&str>) -> Render {
    Render::notice(
        Notice::new(
            "⏰ Support Currently Closed",
            format!(
                "Our Support is currently closed.\n\n{}\n\nPlease try again during our opening hours.",
                schedule
            ),
            COLOUR_RED,
        )
        .image(banner),
    )
}

pub fn ticket_welcome(owner: UserId, banner: Option<&str>) -> Render {
    let mut render = Render::notice(
        Notice::new(
            "Welcome to Your Ticket",
            "A friendly and helpful team member will shortly take care of your request with \
            patience and attention. We want to ensure you receive the best possible support \
            and are always here to help you and answer your questions. Thank you for your trust, \
            we look forward to helping you!",
            COLOUR_BLURPLE,
        )
        .image(banner),
    )
    .with_controls(Controls::TicketActions);
    render.content = Some(format!("<@{}>", owner));
    render
}

pub fn ticket_created(channel_id: ChannelId) -> Notice {
    Notice::new(
        "Ticket Created",
        format!(
            "Your ticket has been successfully created: <#{}>",
            channel_id
        ),
        COLOUR_GREEN,
    )
}

pub fn ticket_claimed(actor: UserId, banner: Option<&str>) -> Render {
    Render::notice(
        Notice::new(
            "Ticket Claimed",
            format!("<@{}> has claimed the ticket and will assist you shortly.", actor),
            COLOUR_GREEN,
        )
        .image(banner),
    )
}

pub fn ticket_claimed_dm(ticket_name: &str, actor: UserId) -> Notice {
    Notice::new(
        "Ticket Update",
        format!(
            "Your ticket **{}** has been claimed by <@{}>.",
            ticket_name, actor
        ),
        COLOUR_GREEN,
    )
}

pub fn ticket_released(actor: UserId, banner: Option<&str>) -> Render {
    Render::notice(
        Notice::new(
            "Ticket Released",
            format!("<@{}> has released the ticket.", actor),
            COLOUR_ORANGE,
        )
        .image(banner),
    )
}

pub fn rating_request(ticket_name: &str, banner: Option<&str>) -> Render {
    Render::notice(
        Notice::new(
            "Ticket Rating",
            format!(
                "Your ticket **{}** has been closed.\nHow would you rate our support?",
                ticket_name
            ),
            COLOUR_GOLD,
        )
        .image(banner),
    )
    .with_controls(Controls::RatingRequest)
}

/// The same rating request once it has been answered
pub fn rating_request_submitted(
    ticket_name: Option<&str>,
    stars: u8,
    ratings: &RatingAggregate,
    banner: Option<&str>,
) -> Render {
    let description = match ticket_name {
        Some(name) => format!(
            "Your ticket **{}** has been closed.\nYou rated our support with {} ({}/5).",
            name,
            "⭐".repeat(usize::from(stars)),
            stars
        ),
        None => format!(
            "You rated our support with {} ({}/5).",
            "⭐".repeat(usize::from(stars)),
            stars
        ),
    };
    Render::notice(Notice::new("Ticket Rating", description, COLOUR_GOLD).image(banner))
        .with_controls(Controls::RatingSubmitted {
            stars,
            average: ratings.average(),
            count: ratings.count,
        })
}

pub fn rating_thanks(stars: u8, ratings: &RatingAggregate) -> Notice {
    let average = ratings.average();
    Notice::new(
        "Thank You for Your Rating!",
        format!(
            "You have rated our support with {} ({}/5).",
            "⭐".repeat(usize::from(stars)),
            stars
        ),
        COLOUR_GOLD,
    )
    .field(
        "Current Average Rating",
        format!(
            "{} ({:.1}/5) based on {} ratings",
            average_stars(average),
            average,
            ratings.count
        ),
        false,
    )
}

pub fn rating_already_submitted(prior: u8) -> Notice {
    Notice::new(
        "Rating Already Submitted",
        format!(
            "You have already rated our support with {} ({}/5). Changes are not possible.",
            "⭐".repeat(usize::from(prior)),
            prior
        ),
        COLOUR_GOLD,
    )
}

pub fn rating_average(ratings: &RatingAggregate) -> Notice {
    let average = ratings.average();
    let mut notice = Notice::new(
        "Rating Average",
        format!(
            "Our current average rating is {} ({:.1}/5)",
            average_stars(average),
            average
        ),
        COLOUR_GOLD,
    );

    let distribution: Vec<String> = ratings
        .distribution()
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .map(|(i, count)| format!("{}: {} rating(s)", "⭐".repeat(i + 1), count))
        .collect();
    if !distribution.is_empty() {
        notice = notice.field("Distribution", distribution.join("\n"), false);
    }

    notice.footer(format!("Based on {} ratings", ratings.count))
}

pub fn ticket_log(
    action: &str,
    ticket_name: &str,
    user: Option<&UserSummary>,
    now: DateTime<Utc>,
) -> Notice {
    let mut notice = Notice::new(
        "Ticket Log",
        format!("**Action:** {}\n**Ticket:** {}", action, ticket_name),
        COLOUR_BLUE,
    )
    .timestamp(now);

    if let Some(user) = user {
        notice = notice
            .field("User", format!("{} ({})", user.mention(), user.name), false)
            .thumbnail(user.avatar_url.clone());
    }
    notice
}

pub fn opening_hours_status(is_open: bool, schedule: &str, now: DateTime<Utc>) -> Render {
    let (status, description, colour) = if is_open {
        (
            "🟢 OPEN",
            "Our support team is currently available to help you!",
            COLOUR_GREEN,
        )
    } else {
        (
            "🔴 CLOSED",
            "Our support team is currently offline. Please try again during our opening hours.",
            COLOUR_RED,
        )
    };

    Render::notice(
        Notice::new(format!("Support Status: {}", status), description, colour)
            .field("Opening Hours", schedule, false)
            .footer("Last updated")
            .timestamp(now),
    )
}

pub fn rules_panel(stats: &VerificationStats, banner: Option<&str>) -> Render {
    let bullet = "•";
    let description = format!(
        "Welcome! Please read and accept our community guidelines.\n\
        **By joining this server, you agree to follow these rules.**\n\n\
        ## 🤝 Community Standards\n\
        {b} Be respectful and kind to all members\n\
        {b} No harassment, hate speech, or discrimination\n\
        {b} Keep conversations appropriate and family-friendly\n\
        {b} No spam, excessive caps, or disruptive behavior\n\
        {b} Political discussions are strictly prohibited\n\n\
        ## 🚫 Prohibited Content\n\
        {b} NSFW, illegal, or harmful content\n\
        {b} Personal information or doxxing\n\
        {b} Advertising without permission\n\
        {b} Malware, viruses, or malicious links\n\n\
        ## ⚖️ Enforcement\n\
        {b} **1st Violation:** Warning\n\
        {b} **2nd Violation:** Temporary timeout\n\
        {b} **3rd Violation:** Permanent ban\n\n\
        ## 🏠 Digital House Rights\n\
        {b} The server team reserves full moderation rights\n\
        {b} Staff decisions are final and binding\n\
        {b} Server access is a privilege, not a right\n\n\
        ## 📞 Support & Appeals\n\
        {b} Contact staff for questions or rule clarifications\n\
        {b} Report violations through proper channels\n\
        {b} Appeals must be submitted respectfully",
        b = bullet
    );

    Render::notice(
        Notice::new("SERVER RULES & GUIDELINES", description, COLOUR_BLURPLE)
            .image(banner)
            .footer(format!(
                "Total Verifications: {} • Success Rate: {}%",
                stats.successes,
                stats.success_rate()
            )),
    )
    .with_controls(Controls::RulesPanel)
}

pub fn verification_code(code: &str, owner: UserId) -> Render {
    Render::text(format!(
        "Your verification code: `{}`\nClick below to enter the code:",
        code
    ))
    .with_controls(Controls::CodeEntry { owner })
}

/// Outage / issue / maintenance / online broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum StatusKind {
    #[name = "Outage"]
    Outage,
    #[name = "Issue"]
    Issue,
    #[name = "Maintenance"]
    Maintenance,
    #[name = "Online"]
    Online,
}

pub fn status_broadcast(
    kind: StatusKind,
    subject: &str,
    message: &str,
    banner: Option<&str>,
) -> Notice {
    let (title, description, colour) = match kind {
        StatusKind::Outage => (
            format!("🔴 Failure for {}", subject),
            format!("**Reason:**\n{}", message),
            COLOUR_RED,
        ),
        StatusKind::Issue => (
            format!("🟠 Issue for {}", subject),
            format!("**Details:**\n{}", message),
            COLOUR_ORANGE,
        ),
        StatusKind::Maintenance => (
            format!("🔵 Maintenance for {}", subject),
            format!("**Info:**\n{}", message),
            COLOUR_BLUE,
        ),
        StatusKind::Online => (
            format!("🟢 Online: {}", subject),
            message.to_string(),
            COLOUR_GREEN,
        ),
    };

    Notice::new(title, description, colour)
        .image(banner)
        .footer(STATUS_FOOTER)
}

/// Server facts shown next to the activity counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildOverview {
    pub name: String,
    pub members: u64,
    pub channels: usize,
    pub created: Option<DateTime<Utc>>,
    pub icon_url: Option<String>,
}

/// 1234567 -> "1,234,567"
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

pub fn statistics(
    guild: &GuildOverview,
    report: &StatsReport,
    requested_by: &UserSummary,
    now: DateTime<Utc>,
) -> Notice {
    let week = &report.week;
    let growth = week.net_growth();
    let growth_emoji = match growth.signum() {
        1 => "📈",
        -1 => "📉",
        _ => "📊",
    };
    let created = guild
        .created
        .map(|at| at.format("%d.%m.%Y").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let breakdown: String = report
        .breakdown
        .iter()
        .map(|(date, day)| {
            format!(
                "`{}` - 📥{} 📤{} 💬{}\n",
                date.format("%a %m-%d"),
                day.new_members,
                day.left_members,
                day.messages
            )
        })
        .collect();

    Notice::new(
        format!("📊 Server Statistics - {}", guild.name),
        "Statistics for the last 7 days",
        COLOUR_GREEN,
    )
    .field(
        "🏠 Server Info",
        format!(
            "**Current Members:** {}\n**Total Channels:** {}\n**Server Created:** {}",
            group_thousands(guild.members),
            guild.channels,
            created
        ),
        true,
    )
    .field(
        "👥 Members (7 Days)",
        format!(
            "**New Members:** {}\n**Members Left:** {}\n**Net Growth:** {} {:+}",
            week.new_members, week.left_members, growth_emoji, growth
        ),
        true,
    )
    .field(
        "💬 Activity (7 Days)",
        format!(
            "**Messages:** {}\n**Voice Joins:** {}\n**Reactions:** {}\n**Commands Used:** {}",
            group_thousands(week.messages),
            week.voice_joins,
            week.reactions_added,
            week.commands_used
        ),
        true,
    )
    .field(
        "🔢 All-Time Totals",
        format!(
            "**Total Joins:** {}\n**Total Leaves:** {}\n**Total Messages:** {}",
            group_thousands(report.totals.total_joins),
            group_thousands(report.totals.total_leaves),
            group_thousands(report.totals.total_messages)
        ),
        true,
    )
    .field(
        "📈 Daily Averages",
        format!(
            "**Messages:** {:.1}\n**New Members:** {:.1}\n**Activity Rate:** {:.1}%",
            report.daily_average(StatKind::Messages),
            report.daily_average(StatKind::NewMembers),
            report.activity_rate(guild.members)
        ),
        true,
    )
    .field("📅 Daily Breakdown", breakdown, false)
    .footer(format!("Requested by {}", requested_by.name))
    .thumbnail(guild.icon_url.clone())
    .timestamp(now)
}

pub fn stats_summary(today: &DailyStats, local_date: NaiveDate, now: DateTime<Utc>) -> Notice {
    Notice::new(
        "📈 Today's Summary",
        format!("Statistics for {}", local_date.format("%A, %B %d, %Y")),
        COLOUR_BLUE,
    )
    .field(
        "Today's Activity",
        format!(
            "**New Members:** {}\n**Members Left:** {}\n**Messages:** {}\n\
            **Voice Joins:** {}\n**Reactions:** {}\n**Commands:** {}",
            today.new_members,
            today.left_members,
            group_thousands(today.messages),
            today.voice_joins,
            today.reactions_added,
            today.commands_used
        ),
        false,
    )
    .timestamp(now)
}

pub fn stats_reset(now: DateTime<Utc>) -> Notice {
    Notice::new(
        "🔄 Statistics Reset",
        "All server statistics have been reset successfully!",
        COLOUR_ORANGE,
    )
    .timestamp(now)
}

pub fn help() -> Notice {
    Notice::new("Bot Commands", "Available commands:", COLOUR_BLUE)
        .field("/ping", "Check if the bot is running", false)
        .field("/rating_average", "Show the average support rating", false)
        .field("/statistics", "Server statistics for the last 7 days", false)
        .field("/stats_summary", "Today's activity at a glance", false)
        .field("/ticket_panel", "Post the ticket board here (Admin)", false)
        .field("/status", "Broadcast a bot status update (Admin)", false)
        .field(
            "/verification_block, /verification_unblock",
            "Bar or re-admit a user from verification (Admin)",
            false,
        )
        .field("/reset_stats, /export_stats", "Manage activity statistics (Admin)", false)
        .field("/bot_logs", "Show recent log lines (Admin)", false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_stars() {
        assert_eq!(average_stars(0.0), "");
        assert_eq!(average_stars(3.0), "⭐⭐⭐");
        assert_eq!(average_stars(3.5), "⭐⭐⭐✨");
        assert_eq!(average_stars(4.4), "⭐⭐⭐⭐");
    }

    #[test]
    fn test_status_broadcast() {
        let outage = status_broadcast(StatusKind::Outage, "MusicBot", "Host is down", None);
        assert_eq!(outage.title, "🔴 Failure for MusicBot");
        assert_eq!(outage.description, "**Reason:**\nHost is down");
        assert_eq!(outage.colour, COLOUR_RED);

        let online = status_broadcast(StatusKind::Online, "MusicBot", "Back up", Some("banner.png"));
        assert_eq!(online.description, "Back up");
        assert_eq!(online.image.as_deref(), Some("banner.png"));
    }

    #[test]
    fn test_rating_average_notice() {
        let mut ratings = RatingAggregate::default();
        for stars in [5, 4, 5, 2] {
            ratings.add(stars).unwrap();
        }
        let notice = rating_average(&ratings);
        assert!(notice.description.contains("(4.0/5)"));
        assert_eq!(notice.fields[0].name, "Distribution");
        assert!(notice.fields[0].value.contains("⭐⭐⭐⭐⭐: 2 rating(s)"));
        assert!(!notice.fields[0].value.contains("⭐⭐⭐: "));
        assert_eq!(notice.footer.as_deref(), Some("Based on 4 ratings"));
    }

    #[test]
    fn test_empty_average_has_no_distribution() {
        let notice = rating_average(&RatingAggregate::default());
        assert!(notice.fields.is_empty());
        assert!(notice.description.contains("(0.0/5)"));
    }

    #[test]
    fn test_titles_carry_slot_markers() {
        let now = Utc::now();
        assert!(opening_hours_status(true, "", now)
            .title()
            .unwrap()
            .starts_with("Support Status:"));
        assert_eq!(ticket_panel(None).title(), Some("Ticket System"));
        assert_eq!(
            rules_panel(&VerificationStats::default(), None).title(),
            Some("SERVER RULES & GUIDELINES")
        );
    }

    #[test]
    fn test_rules_footer_shows_stats() {
        let stats = VerificationStats {
            successes: 3,
            failures: 1,
        };
        let render = rules_panel(&stats, None);
        assert_eq!(
            render.notice.unwrap().footer.as_deref(),
            Some("Total Verifications: 3 • Success Rate: 75%")
        );
    }

    #[test]
    fn test_rating_labels() {
        assert_eq!(rating_label(5), "⭐⭐⭐⭐⭐ Excellent");
        assert_eq!(rating_label(1), "⭐ Very Poor");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_statistics_notice() {
        use crate::state::TotalStats;

        let date = NaiveDate::from_ymd_opt(2025, 10, 20).unwrap();
        let week = DailyStats {
            new_members: 3,
            left_members: 5,
            messages: 1400,
            ..Default::default()
        };
        let report = StatsReport {
            today: date,
            week,
            breakdown: vec![(date, week)],
            totals: TotalStats::default(),
        };
        let guild = GuildOverview {
            name: "Test".to_string(),
            members: 100,
            channels: 12,
            created: None,
            icon_url: None,
        };
        let requester = UserSummary {
            id: UserId::new(1),
            name: "amy".to_string(),
            avatar_url: None,
        };

        let notice = statistics(&guild, &report, &requester, Utc::now());
        assert_eq!(notice.title, "📊 Server Statistics - Test");
        assert!(notice.fields[1].value.contains("📉 -2"));
        assert!(notice.fields[2].value.contains("**Messages:** 1,400"));
        assert!(notice.fields[4].value.contains("**Activity Rate:** 200.0%"));
        assert!(notice.fields[5].value.contains("`Mon 10-20` - 📥3 📤5 💬1400"));
        assert_eq!(notice.footer.as_deref(), Some("Requested by amy"));
    }
}
