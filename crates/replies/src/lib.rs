use std::sync::Arc;

mod canned;
mod config;
mod delay;
mod responder;
#[cfg(feature = "rig")]
mod rig_adapter;
mod simulator;
mod target;

pub use canned::{CANNED_RESPONDER_ID, CannedResponder, default_reply_candidates};
pub use config::{ResponderConfig, RigConfig};
pub use delay::{DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY, DelayPolicy, DelaySource, NoDelay, TokioDelay};
pub use responder::{
    BoxFuture, FnResponder, ReplyRequest, Responder, ResponderError, ResponderResult,
};
#[cfg(feature = "rig")]
pub use rig_adapter::RigResponder;
pub use simulator::{
    DEFAULT_REPLY_TIMEOUT, PendingReply, ReplyHandle, ReplyOutcome, ReplySimulator, ReplyWorker,
};
pub use target::{ExchangeId, ExchangeTarget};

pub fn create_responder(config: ResponderConfig) -> ResponderResult<Arc<dyn Responder>> {
    match config {
        ResponderConfig::Canned { candidates, seed } => {
            let responder = match seed {
                Some(seed) => CannedResponder::seeded(candidates, seed)?,
                None => CannedResponder::from_os_rng(candidates)?,
            };
            Ok(Arc::new(responder))
        }
        ResponderConfig::Rig(config) => create_rig_responder(config),
    }
}

#[cfg(feature = "rig")]
fn create_rig_responder(config: RigConfig) -> ResponderResult<Arc<dyn Responder>> {
    Ok(Arc::new(RigResponder::new(config)?))
}

#[cfg(not(feature = "rig"))]
fn create_rig_responder(config: RigConfig) -> ResponderResult<Arc<dyn Responder>> {
    Err(ResponderError::UnsupportedResponder {
        stage: "create-responder",
        responder_id: config.provider_id,
    })
}
