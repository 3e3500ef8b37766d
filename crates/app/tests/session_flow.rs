use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use popchat::build_session;
use popchat::chat::{
    BusyPolicy, ExchangeOutcome, ExchangeState, ManualClock, NEW_MESSAGE_NOTIFICATION,
    SessionConfig, SessionController, SessionEvent,
};
use popchat::settings::{ChatSettings, ThemeMode};
use popchat_conversation::Origin;
use popchat_replies::{
    CannedResponder, DelayPolicy, FnResponder, ReplySimulator, ResponderError,
    default_reply_candidates,
};

fn welcome_session(clock: Arc<ManualClock>, busy_policy: BusyPolicy) -> SessionController {
    let responder =
        CannedResponder::seeded(default_reply_candidates(), 42).expect("valid candidates");
    let simulator = ReplySimulator::new(Arc::new(responder))
        .with_seed(42)
        .with_delay(DelayPolicy::default());
    SessionController::new(
        SessionConfig {
            welcome_message: Some("Welcome".to_string()),
            busy_policy,
            theme: ThemeMode::Light,
            clock,
        },
        simulator,
    )
}

fn drain(events: &mut tokio::sync::mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

#[tokio::test(start_paused = true)]
async fn welcome_then_hi_produces_one_peer_reply() {
    let clock = Arc::new(ManualClock::new(1_000));
    let mut session = welcome_session(Arc::clone(&clock), BusyPolicy::Queue);
    let mut events = session.subscribe();

    let initial = session.snapshot();
    assert_eq!(initial.len(), 1);
    assert_eq!(initial[0].origin, Origin::Peer);
    assert_eq!(initial[0].text, "Welcome");

    session.submit("hi").expect("submit");
    let after_submit = session.snapshot();
    assert_eq!(after_submit.len(), 2);
    assert_eq!(after_submit[0], initial[0]);
    assert_eq!(after_submit[1].origin, Origin::User);
    assert_eq!(after_submit[1].text, "hi");

    clock.advance(700);
    session.run_until_idle().await;

    let final_log = session.snapshot();
    assert_eq!(final_log.len(), 3);
    assert_eq!(final_log[..2], after_submit[..]);
    assert_eq!(final_log[2].origin, Origin::Peer);
    assert!(default_reply_candidates().contains(&final_log[2].text));
    assert_eq!(*session.state(), ExchangeState::Idle);

    let toasts = drain(&mut events)
        .iter()
        .filter_map(SessionEvent::toast)
        .collect::<Vec<_>>();
    assert_eq!(toasts, vec![NEW_MESSAGE_NOTIFICATION.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn blank_input_changes_nothing() {
    let clock = Arc::new(ManualClock::new(1_000));
    let mut session = welcome_session(clock, BusyPolicy::Queue);
    let mut events = session.subscribe();
    let before = session.snapshot();

    for blank in ["", "   ", "\t\n"] {
        let error = session.submit(blank).expect_err("blank input");
        assert!(error.is_validation());
    }

    assert_eq!(session.snapshot(), before);
    assert!(!session.is_busy());
    assert!(session.settle_next().await.is_none());
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn failing_responder_reports_without_appending() {
    let responder = FnResponder::new("flaky", |_request| async {
        Err(ResponderError::transport("flaky", "upstream unavailable"))
    });
    let simulator = ReplySimulator::new(Arc::new(responder))
        .with_delay(DelayPolicy::Fixed(Duration::ZERO));
    let mut session = SessionController::new(
        SessionConfig {
            welcome_message: None,
            ..SessionConfig::default()
        },
        simulator,
    );
    let mut events = session.subscribe();

    session.submit("hi").expect("submit");
    let outcomes = session.run_until_idle().await;
    assert!(matches!(outcomes.as_slice(), [ExchangeOutcome::Failed { .. }]));

    let final_log = session.snapshot();
    assert_eq!(final_log.len(), 1);
    assert_eq!(final_log[0].origin, Origin::User);

    let drained = drain(&mut events);
    assert!(
        drained
            .iter()
            .any(|event| matches!(event, SessionEvent::ReplyFailed(_)))
    );
    assert!(
        !drained
            .iter()
            .any(|event| matches!(event, SessionEvent::MessageReceived(_)))
    );
    assert_eq!(*session.state(), ExchangeState::Idle);

    // The session stays usable after a failure.
    session.submit("still there?").expect("submit after failure");
    assert!(session.is_busy());
}

#[tokio::test(start_paused = true)]
async fn queued_submissions_keep_reply_order_and_timestamps() {
    let clock = Arc::new(ManualClock::new(5_000));
    let mut session = welcome_session(Arc::clone(&clock), BusyPolicy::Queue);

    let first = session.submit("first").expect("first");
    clock.advance(10);
    let second = session.submit("second").expect("second");
    clock.advance(10);
    let third = session.submit("third").expect("third");
    assert!(!first.queued);
    assert!(second.queued && third.queued);

    let outcomes = session.run_until_idle().await;
    let resolved = outcomes
        .iter()
        .map(|outcome| match outcome {
            ExchangeOutcome::Resolved { target, .. } => *target,
            other => panic!("unexpected outcome {other:?}"),
        })
        .collect::<Vec<_>>();
    assert_eq!(resolved, vec![first.target, second.target, third.target]);

    let records = session.snapshot();
    assert_eq!(records.len(), 7);
    assert!(
        records
            .windows(2)
            .all(|pair| pair[0].created_at_unix_ms <= pair[1].created_at_unix_ms)
    );
    assert!(records.windows(2).all(|pair| pair[0].id < pair[1].id));
}

#[tokio::test(start_paused = true)]
async fn reject_policy_keeps_log_unchanged_while_busy() {
    let clock = Arc::new(ManualClock::new(1_000));
    let mut session = welcome_session(clock, BusyPolicy::Reject);

    session.submit("one").expect("first");
    let before = session.snapshot();
    assert!(session.submit("two").is_err());
    assert_eq!(session.snapshot(), before);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_session_mid_flight_never_calls_the_responder() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let responder = FnResponder::new("counting", move |_request| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok("late".to_string()) }
    });
    let simulator = ReplySimulator::new(Arc::new(responder))
        .with_delay(DelayPolicy::Fixed(Duration::from_secs(1)));
    let mut session = SessionController::new(SessionConfig::default(), simulator);

    session.submit("hi").expect("submit");
    let snapshot = session.snapshot();
    drop(session);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(snapshot.len(), 2);
}

#[tokio::test]
async fn snapshot_is_stable_without_appends() {
    let clock = Arc::new(ManualClock::new(1_000));
    let session = welcome_session(clock, BusyPolicy::Queue);
    assert_eq!(session.snapshot(), session.snapshot());
}

#[tokio::test(start_paused = true)]
async fn default_settings_build_a_working_session() {
    let settings = ChatSettings {
        seed: Some(11),
        ..ChatSettings::default()
    };
    let mut session = build_session(&settings).expect("session from defaults");

    let welcome = session.snapshot();
    assert_eq!(welcome.len(), 1);
    assert_eq!(welcome[0].text, popchat_conversation::DEFAULT_WELCOME_TEXT);

    session.submit("hello").expect("submit");
    session.run_until_idle().await;

    let last = session.log().last().expect("reply");
    assert_eq!(last.origin, Origin::Peer);
    assert!(settings.reply_candidates.contains(&last.text));
}
