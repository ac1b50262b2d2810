use poise::serenity_prelude::UserId;

pub const CREATE_TICKET: &str = "create_ticket";
pub const CLOSE_TICKET: &str = "close_ticket";
pub const CLAIM_TICKET: &str = "claim_ticket";
pub const RELEASE_TICKET: &str = "unclaim_ticket";
pub const RATING_AVERAGE: &str = "rating_avg";
pub const DM_RATING_AVERAGE: &str = "dm_rating_avg";
pub const DM_RATING_AVERAGE_DISABLED: &str = "dm_rating_avg_disabled";
pub const RATING_SELECT: &str = "rating_select";
pub const ACCEPT_RULES: &str = "rules_accept_all";
pub const CODE_ENTRY_PREFIX: &str = "verify_code:";
pub const CODE_MODAL_PREFIX: &str = "verify_modal:";
pub const CODE_INPUT: &str = "verify_code_input";

/// What a user asked for by clicking, selecting, or submitting something
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    CreateTicket,
    ClaimTicket,
    ReleaseTicket,
    CloseTicket,
    ShowRatingAverage,
    SubmitRating { stars: u8 },
    AcceptRules,
    OpenCodeEntry { owner: UserId },
    SubmitCode { owner: UserId, code: String },
}

impl Intent {
    /// Classify a button press or select-menu choice
    pub fn from_component(custom_id: &str, values: &[String]) -> Option<Self> {
        match custom_id {
            CREATE_TICKET => Some(Intent::CreateTicket),
            CLAIM_TICKET => Some(Intent::ClaimTicket),
            RELEASE_TICKET => Some(Intent::ReleaseTicket),
            CLOSE_TICKET => Some(Intent::CloseTicket),
            RATING_AVERAGE | DM_RATING_AVERAGE | DM_RATING_AVERAGE_DISABLED => {
                Some(Intent::ShowRatingAverage)
            }
            RATING_SELECT => values
                .first()
                .and_then(|v| v.trim().parse::<u8>().ok())
                .map(|stars| Intent::SubmitRating { stars }),
            ACCEPT_RULES => Some(Intent::AcceptRules),
            other => parse_owner(other, CODE_ENTRY_PREFIX).map(|owner| Intent::OpenCodeEntry { owner }),
        }
    }

    /// Classify a modal submission
    pub fn from_modal(custom_id: &str, code: &str) -> Option<Self> {
        parse_owner(custom_id, CODE_MODAL_PREFIX).map(|owner| Intent::SubmitCode {
            owner,
            code: code.to_string(),
        })
    }
}

pub fn code_entry_id(owner: UserId) -> String {
    format!("{}{}", CODE_ENTRY_PREFIX, owner)
}

pub fn code_modal_id(owner: UserId) -> String {
    format!("{}{}", CODE_MODAL_PREFIX, owner)
}

fn parse_owner(custom_id: &str, prefix: &str) -> Option<UserId> {
    custom_id
        .strip_prefix(prefix)
        .and_then(|id| id.parse::<u64>().ok())
        .filter(|id| *id != 0)
        .map(UserId::new)
}
