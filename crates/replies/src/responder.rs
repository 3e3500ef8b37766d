use std::future::Future;
use std::pin::Pin;

use snafu::Snafu;

use super::target::ExchangeTarget;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ResponderResult<T> = Result<T, ResponderError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ResponderError {
    #[snafu(display("reply candidate set is empty on `{stage}`"))]
    EmptyCandidates { stage: &'static str },
    #[snafu(display("responder '{responder_id}' returned an empty reply"))]
    EmptyReply {
        stage: &'static str,
        responder_id: String,
    },
    #[snafu(display("responder '{responder_id}' failed on `{stage}`: {message}"))]
    Transport {
        stage: &'static str,
        responder_id: String,
        message: String,
    },
    #[snafu(display("responder '{responder_id}' timed out after {timeout_ms} ms"))]
    Timeout {
        stage: &'static str,
        responder_id: String,
        timeout_ms: u64,
    },
    #[snafu(display("reply for {target} was cancelled before completion"))]
    Cancelled {
        stage: &'static str,
        target: ExchangeTarget,
    },
    #[snafu(display("reply for {target} was already consumed"))]
    AlreadyConsumed {
        stage: &'static str,
        target: ExchangeTarget,
    },
    #[snafu(display("missing API key for responder '{responder_id}'"))]
    MissingApiKey {
        stage: &'static str,
        responder_id: String,
    },
    #[snafu(display("responder '{responder_id}' is not supported in this build"))]
    UnsupportedResponder {
        stage: &'static str,
        responder_id: String,
    },
}

impl ResponderError {
    /// Builds a transport failure for external responders.
    pub fn transport(responder_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            stage: "respond",
            responder_id: responder_id.into(),
            message: message.into(),
        }
    }
}

/// Input handed to a responder for one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRequest {
    pub target: ExchangeTarget,
    pub text: String,
}

impl ReplyRequest {
    pub fn new(target: ExchangeTarget, text: impl Into<String>) -> Self {
        Self {
            target,
            text: text.into(),
        }
    }
}

/// Source of reply text. The returned future must not borrow the responder.
pub trait Responder: Send + Sync {
    fn id(&self) -> &str;
    fn respond(&self, request: ReplyRequest) -> BoxFuture<'static, ResponderResult<String>>;
}

type RespondFn = dyn Fn(ReplyRequest) -> BoxFuture<'static, ResponderResult<String>> + Send + Sync;

/// Adapts an async closure into a [`Responder`].
pub struct FnResponder {
    id: String,
    respond_fn: Box<RespondFn>,
}

impl FnResponder {
    pub fn new<F, Fut>(id: impl Into<String>, respond_fn: F) -> Self
    where
        F: Fn(ReplyRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResponderResult<String>> + Send + 'static,
    {
        Self {
            id: id.into(),
            respond_fn: Box::new(move |request| Box::pin(respond_fn(request))),
        }
    }
}

impl Responder for FnResponder {
    fn id(&self) -> &str {
        &self.id
    }

    fn respond(&self, request: ReplyRequest) -> BoxFuture<'static, ResponderResult<String>> {
        (self.respond_fn)(request)
    }
}
