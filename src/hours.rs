//! Support opening hours.
//!
//! A pure function of the current instant: the instant is converted into the
//! configured timezone and checked against the weekday or weekend window.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use crate::config::{BotConfig, OpeningHoursConfig};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct BusinessHours {
    tz: Tz,
    hours: OpeningHoursConfig,
}

impl BusinessHours {
    pub fn new(tz: Tz, hours: OpeningHoursConfig) -> Self {
        Self { tz, hours }
    }

    pub fn from_config(config: &BotConfig) -> Result<Self> {
        Ok(Self::new(config.tz()?, config.opening_hours.clone()))
    }

    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        let local = self.local_time(now);
        let (open, close) = if is_weekend(local.weekday()) {
            (self.hours.weekend_open, self.hours.weekend_close)
        } else {
            (self.hours.weekday_open, self.hours.weekday_close)
        };
        (open..close).contains(&local.hour())
    }

    fn local_time(&self, now: DateTime<Utc>) -> DateTime<Tz> {
        now.with_timezone(&self.tz)
    }

    /// Schedule shown to users, e.g. in the closed-hours reply
    pub fn schedule_text(&self) -> String {
        format!(
            "**📅 Opening Hours:**\n\
            **Monday - Friday:** {} - {}\n\
            **Saturday - Sunday:** {} - {}",
            format_hour(self.hours.weekday_open),
            format_hour(self.hours.weekday_close),
            format_hour(self.hours.weekend_open),
            format_hour(self.hours.weekend_close),
        )
    }
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

/// 12-hour clock, "8:00 AM" / "6:00 PM"
fn format_hour(hour: u32) -> String {
    let hour = hour % 24;
    let suffix = if hour < 12 { "AM" } else { "PM" };
    let display = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:00 {}", display, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> BusinessHours {
        BusinessHours::new(chrono_tz::Europe::Berlin, OpeningHoursConfig::default())
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_weekday_window() {
        let gate = gate();
        // Monday 2025-10-20, Berlin is UTC+2 (CEST)
        assert!(!gate.is_open_at(utc("2025-10-20T05:59:00Z"))); // 07:59
        assert!(gate.is_open_at(utc("2025-10-20T06:00:00Z"))); // 08:00
        assert!(gate.is_open_at(utc("2025-10-20T15:59:00Z"))); // 17:59
        assert!(!gate.is_open_at(utc("2025-10-20T16:00:00Z"))); // 18:00
        assert!(!gate.is_open_at(utc("2025-10-20T17:00:00Z"))); // 19:00
    }

    #[test]
    fn test_weekend_window() {
        let gate = gate();
        // Saturday 2025-10-25
        assert!(gate.is_open_at(utc("2025-10-25T17:00:00Z"))); // 19:00
        assert!(!gate.is_open_at(utc("2025-10-25T18:00:00Z"))); // 20:00
        assert!(!gate.is_open_at(utc("2025-10-25T05:00:00Z"))); // 07:00
    }

    #[test]
    fn test_follows_dst() {
        let gate = gate();
        // Monday 2025-11-03, Berlin is UTC+1 (CET)
        assert!(gate.is_open_at(utc("2025-11-03T16:30:00Z"))); // 17:30
        assert!(!gate.is_open_at(utc("2025-11-03T17:00:00Z"))); // 18:00
    }

    #[test]
    fn test_schedule_text() {
        let text = gate().schedule_text();
        assert!(text.contains("**Monday - Friday:** 8:00 AM - 6:00 PM"));
        assert!(text.contains("**Saturday - Sunday:** 8:00 AM - 8:00 PM"));
    }

    #[test]
    fn test_format_hour() {
        assert_eq!(format_hour(0), "12:00 AM");
        assert_eq!(format_hour(12), "12:00 PM");
        assert_eq!(format_hour(24), "12:00 AM");
    }
}
