#![deny(unsafe_code)]

/// Chat session core and its terminal surface.
///
/// The session controller owns the conversation log, drives the reply simulator and
/// reports every change as a [`chat::SessionEvent`]. Rendering stays outside the core.
pub mod chat;
/// Settings persistence.
pub mod settings;

use std::sync::Arc;

use snafu::ResultExt;

use chat::{ResponderSnafu, SessionConfig, SessionController, SessionResult, SystemClock};
use popchat_replies::{ReplySimulator, create_responder};
use settings::ChatSettings;

/// Builds a ready session from persisted settings.
pub fn build_session(settings: &ChatSettings) -> SessionResult<SessionController> {
    let responder = create_responder(settings.responder_config()).context(ResponderSnafu {
        stage: "build-session-responder",
    })?;

    let mut simulator = ReplySimulator::new(responder)
        .with_delay(settings.delay_policy())
        .with_timeout(settings.reply_timeout());
    if let Some(seed) = settings.seed {
        simulator = simulator.with_seed(seed);
    }

    let config = SessionConfig {
        welcome_message: settings.welcome_message.clone(),
        busy_policy: settings.busy_policy,
        theme: settings.theme_mode,
        clock: Arc::new(SystemClock),
    };

    Ok(SessionController::new(config, simulator))
}
