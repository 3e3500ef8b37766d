use snafu::Snafu;

use super::ids::MessageId;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConversationError {
    #[snafu(display("message text is empty or whitespace on `{stage}`"))]
    EmptyText { stage: &'static str },
    #[snafu(display("message id '{id}' already exists in the conversation"))]
    DuplicateId { stage: &'static str, id: MessageId },
    #[snafu(display(
        "message '{id}' created at {created_at_unix_ms} precedes last record at {last_unix_ms}"
    ))]
    OutOfOrder {
        stage: &'static str,
        id: MessageId,
        created_at_unix_ms: u64,
        last_unix_ms: u64,
    },
    #[snafu(display("no message ids left after '{last}' on `{stage}`"))]
    IdSpaceExhausted { stage: &'static str, last: MessageId },
    #[snafu(display("session id '{raw}' is invalid"))]
    InvalidSessionId {
        stage: &'static str,
        raw: String,
        source: uuid::Error,
    },
}

impl ConversationError {
    /// Returns true for rejections caused by the submitted record itself.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyText { .. } | Self::DuplicateId { .. } | Self::OutOfOrder { .. }
        )
    }
}

pub type ConversationResult<T> = Result<T, ConversationError>;
