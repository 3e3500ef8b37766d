pub mod clock;
/// Session orchestration: submit, await, resolve or fail.
pub mod controller;
/// Notification contracts for the render surface.
pub mod events;
pub mod input;
/// Deterministic exchange state boundaries.
pub mod message;
pub mod transcript;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{
    BusyPolicy, ExchangeOutcome, SessionConfig, SessionController, SessionError, SessionResult,
    Submitted,
};
pub(crate) use controller::ResponderSnafu;
pub use events::{
    MessageReceived, NEW_MESSAGE_NOTIFICATION, ReplyFailed, SessionEvent, ThemeChanged,
};
pub use input::InputCommand;
pub use message::{
    ExchangeState, ExchangeTransition, ExchangeTransitionRejection, ExchangeTransitionResult,
};
pub use transcript::{Palette, render_record, render_transcript};
