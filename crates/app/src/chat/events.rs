use popchat_conversation::MessageRecord;
use popchat_replies::ExchangeTarget;

use crate::chat::message::ExchangeState;
use crate::settings::ThemeMode;

/// Toast text shown when a reply lands.
pub const NEW_MESSAGE_NOTIFICATION: &str = "New message received!";

/// Emitted after a Peer reply is appended for an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReceived {
    pub target: ExchangeTarget,
    pub record: MessageRecord,
}

impl MessageReceived {
    pub fn notification_text(&self) -> &'static str {
        NEW_MESSAGE_NOTIFICATION
    }
}

/// Emitted when a reply could not be produced. Nothing was appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyFailed {
    pub target: ExchangeTarget,
    pub message: String,
}

/// Emitted when the dark-mode toggle flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeChanged {
    pub theme: ThemeMode,
}

/// Fire-and-forget notifications for the render surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Any record, user or peer, landed in the log. Re-render and scroll.
    MessageAppended(MessageRecord),
    MessageReceived(MessageReceived),
    ReplyFailed(ReplyFailed),
    ThemeChanged(ThemeChanged),
    StateChanged(ExchangeState),
}

impl SessionEvent {
    /// Returns the user-facing toast for events that warrant one.
    pub fn toast(&self) -> Option<String> {
        match self {
            Self::MessageReceived(event) => Some(event.notification_text().to_string()),
            Self::ReplyFailed(event) => Some(format!("Reply failed: {}", event.message)),
            Self::MessageAppended(_) | Self::ThemeChanged(_) | Self::StateChanged(_) => None,
        }
    }
}
