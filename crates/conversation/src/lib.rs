pub mod error;
pub mod ids;
pub mod log;
pub mod types;

pub use error::{ConversationError, ConversationResult};
pub use ids::{MessageId, SessionId};
pub use log::{ConversationLog, current_unix_timestamp_ms, validate_user_text};
pub use types::{DEFAULT_WELCOME_TEXT, MessageRecord, NewMessage, Origin};
