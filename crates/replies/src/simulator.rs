use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use popchat_conversation::NewMessage;
use rand::rngs::StdRng;
use rand::SeedableRng;
use snafu::ensure;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use super::delay::{DelayPolicy, DelaySource, TokioDelay};
use super::responder::{
    AlreadyConsumedSnafu, CancelledSnafu, EmptyReplySnafu, ReplyRequest, Responder,
    ResponderError, ResponderResult,
};
use super::target::ExchangeTarget;

pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

pub type ReplyWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type ReplyOutcome = ResponderResult<NewMessage>;

/// Produces one delayed Peer-origin reply per request.
pub struct ReplySimulator {
    responder: Arc<dyn Responder>,
    delay: DelayPolicy,
    delay_source: Arc<dyn DelaySource>,
    timeout: Option<Duration>,
    rng: Mutex<StdRng>,
}

/// Returned by [`ReplySimulator::request_reply`]: the caller spawns `worker` and awaits `reply`.
pub struct ReplyHandle {
    pub reply: PendingReply,
    pub worker: ReplyWorker,
}

impl ReplySimulator {
    pub fn new(responder: Arc<dyn Responder>) -> Self {
        Self {
            responder,
            delay: DelayPolicy::default(),
            delay_source: Arc::new(TokioDelay),
            timeout: Some(DEFAULT_REPLY_TIMEOUT),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn with_delay(mut self, delay: DelayPolicy) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_delay_source(mut self, delay_source: Arc<dyn DelaySource>) -> Self {
        self.delay_source = delay_source;
        self
    }

    /// `None` lets the responder run unbounded.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn responder_id(&self) -> &str {
        self.responder.id()
    }

    /// Starts a reply for `text` without blocking.
    ///
    /// Nothing happens until `worker` is polled. Dropping or cancelling the
    /// returned [`PendingReply`] stops the worker before it produces anything.
    pub fn request_reply(&self, target: ExchangeTarget, text: impl Into<String>) -> ReplyHandle {
        let delay = self.sample_delay();
        let (result_tx, result_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let job = ReplyJob {
            request: ReplyRequest::new(target, text),
            responder: Arc::clone(&self.responder),
            delay_source: Arc::clone(&self.delay_source),
            delay,
            timeout: self.timeout,
        };

        tracing::debug!(
            target = %target,
            responder_id = %self.responder.id(),
            delay_ms = delay.as_millis() as u64,
            "reply requested"
        );

        ReplyHandle {
            reply: PendingReply::new(target, result_rx, cancel_tx),
            worker: Box::pin(run_reply_worker(job, result_tx, cancel_rx)),
        }
    }

    /// Spawns the worker on the current tokio runtime and returns only the pending side.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn_reply(&self, target: ExchangeTarget, text: impl Into<String>) -> PendingReply {
        let handle = self.request_reply(target, text);
        tokio::spawn(handle.worker);
        handle.reply
    }

    fn sample_delay(&self) -> Duration {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.delay.sample(&mut *rng)
    }
}

struct ReplyJob {
    request: ReplyRequest,
    responder: Arc<dyn Responder>,
    delay_source: Arc<dyn DelaySource>,
    delay: Duration,
    timeout: Option<Duration>,
}

async fn run_reply_worker(
    job: ReplyJob,
    result_tx: oneshot::Sender<ReplyOutcome>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let target = job.request.target;

    // A dropped cancel sender counts as cancellation too.
    let outcome = tokio::select! {
        _ = &mut cancel_rx => {
            tracing::debug!(target = %target, "reply cancelled before completion");
            return;
        }
        outcome = produce_reply(job) => outcome,
    };

    if let Err(error) = &outcome {
        tracing::warn!(target = %target, error = %error, "reply failed");
    }

    if result_tx.send(outcome).is_err() {
        tracing::debug!(target = %target, "reply receiver dropped before delivery");
    }
}

async fn produce_reply(job: ReplyJob) -> ReplyOutcome {
    let ReplyJob {
        request,
        responder,
        delay_source,
        delay,
        timeout,
    } = job;

    delay_source.sleep(delay).await;

    let responder_id = responder.id().to_string();
    let call = responder.respond(request);
    let text = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ResponderError::Timeout {
                    stage: "await-responder",
                    responder_id,
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                });
            }
        },
        None => call.await?,
    };

    ensure!(
        !text.trim().is_empty(),
        EmptyReplySnafu {
            stage: "validate-reply",
            responder_id,
        }
    );

    Ok(NewMessage::peer(text))
}

/// Receiving side of one reply. Resolves exactly once.
pub struct PendingReply {
    target: ExchangeTarget,
    result_rx: oneshot::Receiver<ReplyOutcome>,
    cancel_tx: Option<oneshot::Sender<()>>,
    consumed: bool,
}

impl PendingReply {
    fn new(
        target: ExchangeTarget,
        result_rx: oneshot::Receiver<ReplyOutcome>,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            target,
            result_rx,
            cancel_tx: Some(cancel_tx),
            consumed: false,
        }
    }

    pub fn target(&self) -> ExchangeTarget {
        self.target
    }

    /// Waits for the reply.
    ///
    /// Cancel safe: dropping the future before it completes leaves the reply pending.
    pub async fn wait(&mut self) -> ReplyOutcome {
        ensure!(
            !self.consumed,
            AlreadyConsumedSnafu {
                stage: "wait-reply",
                target: self.target,
            }
        );

        let received = (&mut self.result_rx).await;
        self.consumed = true;
        match received {
            Ok(outcome) => outcome,
            Err(_) => CancelledSnafu {
                stage: "wait-reply",
                target: self.target,
            }
            .fail(),
        }
    }

    /// Returns the reply if it has already arrived.
    pub fn try_wait(&mut self) -> Option<ReplyOutcome> {
        if self.consumed {
            return Some(
                AlreadyConsumedSnafu {
                    stage: "try-wait-reply",
                    target: self.target,
                }
                .fail(),
            );
        }

        match self.result_rx.try_recv() {
            Ok(outcome) => {
                self.consumed = true;
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => {
                self.consumed = true;
                Some(
                    CancelledSnafu {
                        stage: "try-wait-reply",
                        target: self.target,
                    }
                    .fail(),
                )
            }
        }
    }

    /// Asks the worker to stop. Returns false when it was already stopped or cancelled.
    pub fn cancel(&mut self) -> bool {
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use popchat_conversation::{Origin, SessionId};

    use super::*;
    use crate::canned::{CannedResponder, default_reply_candidates};
    use crate::delay::NoDelay;
    use crate::responder::FnResponder;
    use crate::target::ExchangeId;

    fn target(exchange: u64) -> ExchangeTarget {
        ExchangeTarget::new(SessionId::new_v7(), ExchangeId::new(exchange))
    }

    fn canned_simulator(seed: u64) -> ReplySimulator {
        let responder =
            CannedResponder::seeded(default_reply_candidates(), seed).expect("valid candidates");
        ReplySimulator::new(Arc::new(responder)).with_seed(seed)
    }

    #[tokio::test(start_paused = true)]
    async fn reply_resolves_once_with_a_peer_candidate() {
        let simulator = canned_simulator(1);
        let mut pending = simulator.spawn_reply(target(1), "hello");

        let reply = pending.wait().await.expect("reply");
        assert_eq!(reply.origin, Origin::Peer);
        assert!(default_reply_candidates().contains(&reply.text));

        let again = pending.wait().await;
        assert!(matches!(again, Err(ResponderError::AlreadyConsumed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn reply_waits_for_the_sampled_delay() {
        let simulator =
            canned_simulator(2).with_delay(DelayPolicy::Fixed(Duration::from_millis(800)));
        let mut pending = simulator.spawn_reply(target(1), "hello");

        tokio::time::sleep(Duration::from_millis(799)).await;
        assert!(pending.try_wait().is_none());

        tokio::time::sleep(Duration::from_millis(2)).await;
        let reply = pending.try_wait().expect("reply arrived").expect("reply ok");
        assert_eq!(reply.origin, Origin::Peer);
    }

    #[tokio::test]
    async fn worker_is_inert_until_polled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let responder = FnResponder::new("counting", move |_request| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok("pong".to_string()) }
        });
        let simulator = ReplySimulator::new(Arc::new(responder))
            .with_delay_source(Arc::new(NoDelay));

        let handle = simulator.request_reply(target(1), "ping");
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let ReplyHandle { mut reply, worker } = handle;
        worker.await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(reply.wait().await.expect("reply").text, "pong");
    }

    #[tokio::test(start_paused = true)]
    async fn external_failure_surfaces_as_responder_error() {
        let responder = FnResponder::new("offline", |_request| async {
            Err(ResponderError::transport("offline", "connection refused"))
        });
        let simulator = ReplySimulator::new(Arc::new(responder));
        let mut pending = simulator.spawn_reply(target(1), "hi");

        let error = pending.wait().await.expect_err("transport failure");
        assert!(matches!(error, ResponderError::Transport { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_responder_times_out() {
        let responder = FnResponder::new("slow", |_request| async {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok("late".to_string())
        });
        let simulator = ReplySimulator::new(Arc::new(responder))
            .with_delay(DelayPolicy::Fixed(Duration::ZERO))
            .with_timeout(Some(Duration::from_secs(5)));
        let mut pending = simulator.spawn_reply(target(1), "hi");

        let error = pending.wait().await.expect_err("timeout");
        assert!(matches!(error, ResponderError::Timeout { timeout_ms: 5_000, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn blank_external_reply_is_rejected() {
        let responder = FnResponder::new("mute", |_request| async { Ok("  ".to_string()) });
        let simulator = ReplySimulator::new(Arc::new(responder));
        let mut pending = simulator.spawn_reply(target(1), "hi");

        let error = pending.wait().await.expect_err("empty reply");
        assert!(matches!(error, ResponderError::EmptyReply { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_pending_reply_stops_the_worker() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let responder = FnResponder::new("counting", move |_request| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok("pong".to_string()) }
        });
        let simulator = ReplySimulator::new(Arc::new(responder))
            .with_delay(DelayPolicy::Fixed(Duration::from_secs(1)));

        let pending = simulator.spawn_reply(target(1), "ping");
        drop(pending);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_cancel_reports_cancelled() {
        let simulator =
            canned_simulator(4).with_delay(DelayPolicy::Fixed(Duration::from_secs(1)));
        let mut pending = simulator.spawn_reply(target(1), "ping");

        assert!(pending.cancel());
        assert!(!pending.cancel());

        let error = pending.wait().await.expect_err("cancelled");
        assert!(matches!(error, ResponderError::Cancelled { .. }));
    }
}
