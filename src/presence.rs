use poise::serenity_prelude::{self as serenity, ActivityData, OnlineStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Cycles the bot's custom status through a fixed list of texts
pub struct PresenceRotator {
    statuses: Vec<String>,
    index: AtomicUsize,
}

impl PresenceRotator {
    pub fn new(statuses: Vec<String>) -> Self {
        Self {
            statuses,
            index: AtomicUsize::new(0),
        }
    }

    /// The next text to show, wrapping around at the end
    pub fn advance(&self) -> Option<&str> {
        if self.statuses.is_empty() {
            return None;
        }
        let index = self.index.fetch_add(1, Ordering::Relaxed) % self.statuses.len();
        Some(&self.statuses[index])
    }

    pub fn apply_next(&self, ctx: &serenity::Context) {
        if let Some(text) = self.advance() {
            ctx.set_presence(Some(ActivityData::custom(text)), OnlineStatus::Online);
            info!("Status changed: {}", text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_wraps() {
        let rotator = PresenceRotator::new(vec!["a".into(), "b".into(), "c".into()]);
        let seen: Vec<_> = (0..5).filter_map(|_| rotator.advance()).collect();
        assert_eq!(seen, vec!["a", "b", "c", "a", "b"]);
    }

    #[test]
    fn test_empty_rotation() {
        let rotator = PresenceRotator::new(Vec::new());
        assert_eq!(rotator.advance(), None);
    }
}
