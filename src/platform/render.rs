use chrono::{DateTime, Utc};
use poise::serenity_prelude::UserId;

pub const COLOUR_GREEN: u32 = 0x2ecc71;
pub const COLOUR_RED: u32 = 0xe74c3c;
pub const COLOUR_GOLD: u32 = 0xf1c40f;
pub const COLOUR_BLUE: u32 = 0x3498db;
pub const COLOUR_ORANGE: u32 = 0xe67e22;
pub const COLOUR_BLURPLE: u32 = 0x5865f2;

/// Platform-neutral embed
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub colour: u32,
    pub fields: Vec<NoticeField>,
    pub footer: Option<String>,
    pub image: Option<String>,
    pub thumbnail: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoticeField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl Notice {
    pub fn new(title: impl Into<String>, description: impl Into<String>, colour: u32) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            colour,
            fields: Vec::new(),
            footer: None,
            image: None,
            thumbnail: None,
            timestamp: None,
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(NoticeField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn image(mut self, url: Option<&str>) -> Self {
        self.image = url.map(String::from);
        self
    }

    pub fn thumbnail(mut self, url: Option<String>) -> Self {
        self.thumbnail = url;
        self
    }

    pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }
}

/// Interactive components attached to a message
#[derive(Debug, Clone, PartialEq)]
pub enum Controls {
    None,
    /// "Create a Ticket" + "Rating Average"
    TicketPanel,
    /// "Close", "Claim", "Release" inside a ticket channel
    TicketActions,
    /// Star select + "Rating Average", sent to the ticket creator
    RatingRequest,
    /// Read-only rendering of an answered rating request
    RatingSubmitted { stars: u8, average: f64, count: u64 },
    /// "I Accept All Rules"
    RulesPanel,
    /// "Enter Code", usable only by `owner`
    CodeEntry { owner: UserId },
}

/// What a message should look like
#[derive(Debug, Clone, PartialEq)]
pub struct Render {
    pub content: Option<String>,
    pub notice: Option<Notice>,
    pub controls: Controls,
}

impl Render {
    pub fn notice(notice: Notice) -> Self {
        Self {
            content: None,
            notice: Some(notice),
            controls: Controls::None,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            notice: None,
            controls: Controls::None,
        }
    }

    pub fn with_controls(mut self, controls: Controls) -> Self {
        self.controls = controls;
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.notice.as_ref().map(|n| n.title.as_str())
    }
}
