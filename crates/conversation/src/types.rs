use serde::{Deserialize, Serialize};

use super::ids::MessageId;

/// Greeting the widget shows before the user has typed anything.
pub const DEFAULT_WELCOME_TEXT: &str = "👋 Welcome to Snapchat Messenger!";

/// Who authored a record. New origins may be added, so match with a wildcard arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Origin {
    User,
    Peer,
}

impl Origin {
    pub fn is_user(self) -> bool {
        matches!(self, Self::User)
    }
}

/// One entry of the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub origin: Origin,
    pub text: String,
    pub created_at_unix_ms: u64,
}

impl MessageRecord {
    pub fn new(
        id: MessageId,
        origin: Origin,
        text: impl Into<String>,
        created_at_unix_ms: u64,
    ) -> Self {
        Self {
            id,
            origin,
            text: text.into(),
            created_at_unix_ms,
        }
    }

    pub fn user(id: MessageId, text: impl Into<String>, created_at_unix_ms: u64) -> Self {
        Self::new(id, Origin::User, text, created_at_unix_ms)
    }

    pub fn peer(id: MessageId, text: impl Into<String>, created_at_unix_ms: u64) -> Self {
        Self::new(id, Origin::Peer, text, created_at_unix_ms)
    }
}

/// Record draft without identity; the log assigns id and timestamp on push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub origin: Origin,
    pub text: String,
}

impl NewMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::User,
            text: text.into(),
        }
    }

    pub fn peer(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::Peer,
            text: text.into(),
        }
    }
}
