use chrono::{DateTime, Duration, Utc};
use poise::serenity_prelude::UserId;
use rand::distributions::Uniform;
use rand::Rng;

const CODE_LENGTH: usize = 8;
const CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A one-time verification code bound to the user it was issued to.
///
/// Never persisted; it lives only as long as the interactive flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub owner: UserId,
    pub code: String,
    pub issued_at: DateTime<Utc>,
}

impl Challenge {
    pub fn issue(owner: UserId, now: DateTime<Utc>) -> Self {
        Self::with_code(owner, generate_code(), now)
    }

    pub fn with_code(owner: UserId, code: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            owner,
            code: code.into(),
            issued_at: now,
        }
    }

    /// Case-insensitive, whitespace-trimmed comparison
    pub fn matches(&self, input: &str) -> bool {
        input.trim().to_lowercase() == self.code.to_lowercase()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: std::time::Duration) -> bool {
        let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::minutes(10));
        now - self.issued_at >= ttl
    }
}

/// Eight random lowercase alphanumeric characters
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    let range = Uniform::from(0..CODE_ALPHABET.len());
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.sample(range)] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_shape() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 8);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_match_ignores_case_and_whitespace() {
        let challenge = Challenge::with_code(UserId::new(1), "abc123", Utc::now());
        assert!(challenge.matches(" ABC123 "));
        assert!(challenge.matches("abc123"));
        assert!(challenge.matches("\tAbC123\n"));
    }

    #[test]
    fn test_single_differing_character_fails() {
        let challenge = Challenge::with_code(UserId::new(1), "abc123", Utc::now());
        assert!(!challenge.matches("abc124"));
        assert!(!challenge.matches("xbc123"));
        assert!(!challenge.matches("abc12"));
        assert!(!challenge.matches("abc1234"));
        assert!(!challenge.matches("ab c123"));
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let challenge = Challenge::with_code(UserId::new(1), "abc123", now);
        let ttl = std::time::Duration::from_secs(600);
        assert!(!challenge.is_expired_at(now + Duration::minutes(9), ttl));
        assert!(challenge.is_expired_at(now + Duration::minutes(10), ttl));
    }
}
