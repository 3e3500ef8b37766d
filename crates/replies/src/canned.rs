use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use snafu::ensure;

use super::responder::{
    BoxFuture, EmptyCandidatesSnafu, ReplyRequest, Responder, ResponderResult,
};

pub const CANNED_RESPONDER_ID: &str = "canned";

pub fn default_reply_candidates() -> Vec<String> {
    [
        "That's awesome! 😁",
        "Tell me more!",
        "Cool! What else is new?",
        "Interesting, I'd love to hear more about that!",
        "Nice! Have you tried the new Snapchat filters?",
        "Haha, that's funny! 😂",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// Picks a reply uniformly at random from a fixed, non-empty candidate set.
pub struct CannedResponder {
    candidates: Vec<String>,
    rng: Mutex<StdRng>,
}

impl CannedResponder {
    pub fn with_rng(candidates: Vec<String>, rng: StdRng) -> ResponderResult<Self> {
        let candidates = candidates
            .into_iter()
            .filter(|candidate| !candidate.trim().is_empty())
            .collect::<Vec<_>>();
        ensure!(
            !candidates.is_empty(),
            EmptyCandidatesSnafu {
                stage: "canned-responder-new",
            }
        );

        Ok(Self {
            candidates,
            rng: Mutex::new(rng),
        })
    }

    pub fn seeded(candidates: Vec<String>, seed: u64) -> ResponderResult<Self> {
        Self::with_rng(candidates, StdRng::seed_from_u64(seed))
    }

    pub fn from_os_rng(candidates: Vec<String>) -> ResponderResult<Self> {
        Self::with_rng(candidates, StdRng::from_os_rng())
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    fn pick(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let index = rng.random_range(0..self.candidates.len());
        self.candidates[index].clone()
    }
}

impl Responder for CannedResponder {
    fn id(&self) -> &str {
        CANNED_RESPONDER_ID
    }

    fn respond(&self, request: ReplyRequest) -> BoxFuture<'static, ResponderResult<String>> {
        let reply = self.pick();
        tracing::trace!(target = %request.target, reply = %reply, "picked canned reply");
        Box::pin(async move { Ok(reply) })
    }
}
