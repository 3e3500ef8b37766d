use std::collections::VecDeque;
use std::sync::Arc;

use popchat_conversation::{
    ConversationError, ConversationLog, MessageRecord, NewMessage, SessionId, validate_user_text,
};
use popchat_replies::{
    ExchangeId, ExchangeTarget, PendingReply, ReplyOutcome, ReplySimulator, ResponderError,
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::chat::clock::{Clock, SystemClock};
use crate::chat::events::{MessageReceived, ReplyFailed, SessionEvent, ThemeChanged};
use crate::chat::message::{ExchangeState, ExchangeTransition, ExchangeTransitionRejection};
use crate::settings::ThemeMode;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    #[snafu(display("submission rejected on `{stage}`: {source}"))]
    Validation {
        stage: &'static str,
        source: ConversationError,
    },
    #[snafu(display("a reply for {active} is still pending"))]
    Busy {
        stage: &'static str,
        active: ExchangeTarget,
    },
    #[snafu(display("illegal exchange transition on `{stage}`: {rejection:?}"))]
    Transition {
        stage: &'static str,
        rejection: ExchangeTransitionRejection,
    },
    #[snafu(display("responder failed on `{stage}`: {source}"))]
    Responder {
        stage: &'static str,
        source: ResponderError,
    },
    #[snafu(display("reply could not be appended on `{stage}`: {source}"))]
    AppendReply {
        stage: &'static str,
        source: ConversationError,
    },
}

impl SessionError {
    /// Validation failures are silent no-ops for the user.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { source, .. } if source.is_validation())
    }
}

/// What to do with a submission that arrives while a reply is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// Append the message now and answer it after the pending reply.
    #[default]
    Queue,
    /// Refuse the submission and leave the log unchanged.
    Reject,
}

pub struct SessionConfig {
    pub welcome_message: Option<String>,
    pub busy_policy: BusyPolicy,
    pub theme: ThemeMode,
    pub clock: Arc<dyn Clock>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            welcome_message: Some(popchat_conversation::DEFAULT_WELCOME_TEXT.to_string()),
            busy_policy: BusyPolicy::default(),
            theme: ThemeMode::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Result of a successful [`SessionController::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub target: ExchangeTarget,
    pub record: MessageRecord,
    /// True when the reply waits behind an earlier exchange.
    pub queued: bool,
}

/// How one exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Resolved {
        target: ExchangeTarget,
        record: MessageRecord,
    },
    Failed {
        target: ExchangeTarget,
        message: String,
    },
}

impl ExchangeOutcome {
    pub fn target(&self) -> ExchangeTarget {
        match self {
            Self::Resolved { target, .. } | Self::Failed { target, .. } => *target,
        }
    }
}

struct InFlight {
    pending: PendingReply,
    worker_task: JoinHandle<()>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        // The pending side signals cancellation on its own drop; abort covers a worker
        // stuck inside a responder call.
        self.worker_task.abort();
    }
}

struct QueuedExchange {
    target: ExchangeTarget,
    text: String,
}

/// Owns one chat session: the conversation log, the reply slot and the theme.
///
/// All mutation goes through `&mut self`, so appends are serialized. Dropping the
/// controller cancels any reply still in flight; it can never touch the log afterwards.
pub struct SessionController {
    session_id: SessionId,
    log: ConversationLog,
    simulator: ReplySimulator,
    clock: Arc<dyn Clock>,
    state: ExchangeState,
    busy_policy: BusyPolicy,
    theme: ThemeMode,
    in_flight: Option<InFlight>,
    queued: VecDeque<QueuedExchange>,
    next_exchange: ExchangeId,
    subscribers: Vec<mpsc::UnboundedSender<SessionEvent>>,
}

impl SessionController {
    pub fn new(config: SessionConfig, simulator: ReplySimulator) -> Self {
        let SessionConfig {
            welcome_message,
            busy_policy,
            theme,
            clock,
        } = config;

        let log = match welcome_message {
            Some(text) if !text.trim().is_empty() => {
                ConversationLog::seeded(text, clock.now_unix_ms())
            }
            _ => ConversationLog::new(),
        };

        let session_id = SessionId::new_v7();
        tracing::info!(
            session_id = %session_id,
            responder_id = %simulator.responder_id(),
            busy_policy = ?busy_policy,
            theme = ?theme,
            "session started"
        );

        Self {
            session_id,
            log,
            simulator,
            clock,
            state: ExchangeState::Idle,
            busy_policy,
            theme,
            in_flight: None,
            queued: VecDeque::new(),
            next_exchange: ExchangeId::new(1),
            subscribers: Vec::new(),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn state(&self) -> &ExchangeState {
        &self.state
    }

    /// True while a reply is pending; the input surface shows itself as busy.
    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn snapshot(&self) -> Vec<MessageRecord> {
        self.log.snapshot()
    }

    pub fn theme(&self) -> ThemeMode {
        self.theme
    }

    pub fn set_theme(&mut self, theme: ThemeMode) {
        if self.theme == theme {
            return;
        }
        self.theme = theme;
        tracing::debug!(session_id = %self.session_id, theme = ?theme, "theme changed");
        self.emit(SessionEvent::ThemeChanged(ThemeChanged { theme }));
    }

    pub fn toggle_theme(&mut self) -> ThemeMode {
        self.set_theme(self.theme.toggled());
        self.theme
    }

    /// Registers a notification sink. Closed receivers are pruned on the next event.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.subscribers.push(event_tx);
        event_rx
    }

    /// Appends `text` as a User record and starts (or queues) its reply.
    ///
    /// Blank text fails with a validation error and changes nothing.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, because the reply worker is spawned.
    pub fn submit(&mut self, text: &str) -> SessionResult<Submitted> {
        validate_user_text(text).context(ValidationSnafu {
            stage: "submit-validate",
        })?;

        if let Some(in_flight) = &self.in_flight
            && self.busy_policy == BusyPolicy::Reject
        {
            return BusySnafu {
                stage: "submit-busy",
                active: in_flight.pending.target(),
            }
            .fail();
        }

        let target = self.alloc_target();
        let record = self
            .log
            .push(NewMessage::user(text), self.clock.now_unix_ms())
            .context(ValidationSnafu {
                stage: "submit-append",
            })?
            .clone();

        tracing::debug!(
            session_id = %self.session_id,
            exchange = %target.exchange,
            message_id = %record.id,
            "user message appended"
        );
        self.emit(SessionEvent::MessageAppended(record.clone()));

        if self.in_flight.is_some() {
            self.queued.push_back(QueuedExchange {
                target,
                text: text.to_string(),
            });
            tracing::debug!(
                session_id = %self.session_id,
                exchange = %target.exchange,
                queued = self.queued.len(),
                "reply queued behind pending exchange"
            );
            return Ok(Submitted {
                target,
                record,
                queued: true,
            });
        }

        self.begin_exchange(target, text.to_string())?;
        Ok(Submitted {
            target,
            record,
            queued: false,
        })
    }

    /// Waits for the pending reply and applies it. Returns `None` when nothing is pending.
    ///
    /// Cancel safe: if the returned future is dropped early the reply stays pending.
    pub async fn settle_next(&mut self) -> Option<ExchangeOutcome> {
        let in_flight = self.in_flight.as_mut()?;
        let result = in_flight.pending.wait().await;
        let target = in_flight.pending.target();
        self.in_flight = None;

        let outcome = self.apply_reply(target, result);
        self.dispatch_queued();
        Some(outcome)
    }

    /// Settles pending and queued exchanges until the session is idle.
    pub async fn run_until_idle(&mut self) -> Vec<ExchangeOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.settle_next().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Cancels outstanding work and returns the final log.
    pub fn shutdown(mut self) -> Vec<MessageRecord> {
        if let Some(mut in_flight) = self.in_flight.take() {
            let target = in_flight.pending.target();
            in_flight.pending.cancel();
            if let Err(error) = self.transition(ExchangeTransition::Cancel(target)) {
                tracing::debug!(error = %error, "cancel transition rejected during shutdown");
            }
        }

        let dropped = self.queued.len();
        self.queued.clear();
        tracing::info!(
            session_id = %self.session_id,
            records = self.log.len(),
            dropped_queued = dropped,
            "session shut down"
        );
        self.log.snapshot()
    }

    fn begin_exchange(&mut self, target: ExchangeTarget, text: String) -> SessionResult<()> {
        self.transition(ExchangeTransition::Submit(target))?;

        let handle = self.simulator.request_reply(target, text);
        let worker_task = tokio::spawn(handle.worker);
        self.in_flight = Some(InFlight {
            pending: handle.reply,
            worker_task,
        });

        self.transition(ExchangeTransition::Dispatch(target))?;
        Ok(())
    }

    fn apply_reply(&mut self, target: ExchangeTarget, result: ReplyOutcome) -> ExchangeOutcome {
        // Cancelled exchanges never deliver, so `result` always belongs to `target`.
        let appended = match result {
            Ok(draft) => self
                .log
                .push(draft, self.clock.now_unix_ms())
                .map(|record| record.clone())
                .context(AppendReplySnafu {
                    stage: "append-reply",
                }),
            Err(source) => Err(SessionError::Responder {
                stage: "await-reply",
                source,
            }),
        };

        let outcome = match appended {
            Ok(record) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    exchange = %target.exchange,
                    message_id = %record.id,
                    "reply appended"
                );
                self.finish(ExchangeTransition::Resolve(target));
                self.emit(SessionEvent::MessageAppended(record.clone()));
                self.emit(SessionEvent::MessageReceived(MessageReceived {
                    target,
                    record: record.clone(),
                }));
                ExchangeOutcome::Resolved { target, record }
            }
            Err(error) => {
                let message = error.to_string();
                tracing::warn!(
                    session_id = %self.session_id,
                    exchange = %target.exchange,
                    error = %message,
                    "reply failed; log left unchanged"
                );
                self.finish(ExchangeTransition::Fail {
                    target,
                    message: message.clone(),
                });
                self.emit(SessionEvent::ReplyFailed(ReplyFailed {
                    target,
                    message: message.clone(),
                }));
                ExchangeOutcome::Failed { target, message }
            }
        };

        if let Err(error) = self.transition(ExchangeTransition::ResetToIdle) {
            tracing::error!(error = %error, "reset to idle rejected");
        }
        outcome
    }

    fn finish(&mut self, transition: ExchangeTransition) {
        if let Err(error) = self.transition(transition) {
            tracing::error!(
                session_id = %self.session_id,
                error = %error,
                "terminal exchange transition rejected"
            );
        }
    }

    fn dispatch_queued(&mut self) {
        while self.in_flight.is_none() {
            let Some(next) = self.queued.pop_front() else {
                return;
            };

            if let Err(error) = self.begin_exchange(next.target, next.text) {
                tracing::error!(
                    session_id = %self.session_id,
                    exchange = %next.target.exchange,
                    error = %error,
                    "failed to dispatch queued exchange"
                );
                self.in_flight = None;
                self.state = ExchangeState::Idle;
                self.emit(SessionEvent::ReplyFailed(ReplyFailed {
                    target: next.target,
                    message: error.to_string(),
                }));
            }
        }
    }

    fn transition(&mut self, transition: ExchangeTransition) -> SessionResult<()> {
        let next_state = self
            .state
            .apply(transition)
            .map_err(|rejection| SessionError::Transition {
                stage: "apply-exchange-transition",
                rejection,
            })?;
        self.state = next_state.clone();
        self.emit(SessionEvent::StateChanged(next_state));
        Ok(())
    }

    fn alloc_target(&mut self) -> ExchangeTarget {
        let exchange = self.next_exchange;
        self.next_exchange = exchange.next();
        ExchangeTarget::new(self.session_id, exchange)
    }

    fn emit(&mut self, event: SessionEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}
