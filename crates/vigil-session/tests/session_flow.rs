//! End-to-end attempt scenarios with in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use vigil_detect::{CapabilityTable, DetectorEnv, PageEvent, StaticEnvironment};
use vigil_keypool::{KeyPool, PoolConfig, UpstreamError};
use vigil_proctor::{PageContext, ProctorConfig, ProctorEngine, ProctorNotice};
use vigil_session::*;
use vigil_types::{AttemptId, AttemptStatus, Clock, ManualClock, QuestionId};

const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0";

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct Harness {
    session: QuizSession,
    attempts: Arc<MemoryAttemptSink>,
    log: Arc<MemoryViolationLog>,
    start: DateTime<Utc>,
}

fn quiz() -> Quiz {
    Quiz::new(
        "algebra-1",
        "Algebra",
        vec![
            Question::new("q1", "1 + 1", vec!["1".into(), "2".into()], 1),
            Question::new("q2", "2 * 3", vec!["5".into(), "6".into()], 1),
        ],
    )
}

fn harness_with(quiz: Quiz, attempts: MemoryAttemptSink, config: SessionConfig) -> Harness {
    build(quiz, attempts, config, None)
}

fn build(
    quiz: Quiz,
    attempts: MemoryAttemptSink,
    config: SessionConfig,
    integrity: Option<Arc<AiService>>,
) -> Harness {
    let clock = Arc::new(ManualClock::starting_now());
    let start = clock.now();
    let env = DetectorEnv::new(
        Arc::new(CapabilityTable::new()),
        Arc::new(StaticEnvironment::browser(DESKTOP_UA)),
        clock,
    );
    let proctor = ProctorEngine::for_page(
        AttemptId::generate(),
        env,
        PageContext::new(DESKTOP_UA, "https://quiz.example/algebra-1"),
        ProctorConfig::default(),
    )
    .unwrap();

    let attempts = Arc::new(attempts);
    let log = Arc::new(MemoryViolationLog::new());
    let mut collaborators = Collaborators::new(attempts.clone(), log.clone());
    if let Some(ai) = integrity {
        collaborators = collaborators.with_integrity(ai);
    }
    Harness {
        session: QuizSession::new(Arc::new(quiz), proctor, collaborators, config),
        attempts,
        log,
        start,
    }
}

fn harness() -> Harness {
    harness_with(quiz(), MemoryAttemptSink::new(), SessionConfig::default())
}

fn at(h: &Harness, secs: i64) -> DateTime<Utc> {
    h.start + chrono::Duration::seconds(secs)
}

fn start(h: &mut Harness) {
    h.session.submit_identity("Ada Lovelace", "R-17").unwrap();
    let now = h.start;
    h.session.acknowledge(now).unwrap();
}

fn answer_all(h: &mut Harness) {
    h.session.answer(QuestionId::new("q1"), 1).unwrap();
    h.session.answer(QuestionId::new("q2"), 0).unwrap();
}

/// Leave and come back once, counted as one desktop violation.
fn depart(h: &mut Harness, secs: i64) -> Vec<SessionEvent> {
    let now = at(h, secs);
    let events = h.session.handle_event(&PageEvent::WindowBlur, now).events;
    h.session.handle_event(&PageEvent::WindowFocus, now);
    events
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn identity_is_required_before_briefing() {
    let mut h = harness();
    assert!(matches!(
        h.session.submit_identity("  ", "R-17"),
        Err(SessionError::InvalidIdentity)
    ));
    assert!(matches!(
        h.session.acknowledge(h.start),
        Err(SessionError::InvalidTransition { .. })
    ));
    h.session.submit_identity("Ada", "R-17").unwrap();
    assert_eq!(h.session.state(), SessionState::Briefing);
}

#[tokio::test]
async fn answers_are_validated() {
    let mut h = harness();
    start(&mut h);
    assert!(matches!(
        h.session.answer(QuestionId::new("q9"), 0),
        Err(SessionError::UnknownQuestion(_))
    ));
    assert!(matches!(
        h.session.answer(QuestionId::new("q1"), 5),
        Err(SessionError::InvalidChoice { .. })
    ));
}

#[tokio::test]
async fn incomplete_manual_submit_is_rejected() {
    let mut h = harness();
    start(&mut h);
    h.session.answer(QuestionId::new("q1"), 1).unwrap();

    let err = h.session.submit(at(&h, 30)).await.unwrap_err();
    assert!(matches!(err, SessionError::Incomplete { unanswered: 1, total: 2 }));
    assert_eq!(h.session.state(), SessionState::Active);
    assert_eq!(h.attempts.calls(), 0);
}

#[tokio::test]
async fn clean_attempt_completes() {
    let mut h = harness();
    start(&mut h);
    answer_all(&mut h);

    let outcome = h.session.submit(at(&h, 60)).await.unwrap();
    assert_eq!(outcome.state, SessionState::Completed);
    assert_eq!(outcome.submission, SubmissionKind::Manual);
    assert_eq!(outcome.attempt.score, 50);
    assert!(!outcome.attempt.is_flagged);

    let stored = h.attempts.attempts();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].student_identity.registration_id, "R-17");
    assert!(h.session.state().is_terminal());
}

// ---------------------------------------------------------------------------
// Flagging
// ---------------------------------------------------------------------------

#[tokio::test]
async fn two_violations_then_manual_submit_is_not_flagged() {
    let mut h = harness();
    start(&mut h);
    depart(&mut h, 10);
    depart(&mut h, 20);
    answer_all(&mut h);

    let outcome = h.session.submit(at(&h, 30)).await.unwrap();
    assert_eq!(outcome.state, SessionState::Completed);
    assert_eq!(outcome.attempt.violation_count, 2);
    assert!(!outcome.attempt.violation_triggered);
    assert!(!outcome.attempt.is_flagged);
    assert_eq!(outcome.attempt.status, AttemptStatus::Completed);

    settle().await;
    assert_eq!(h.log.entries().len(), 2);
}

#[tokio::test]
async fn violations_in_grace_window_are_ignored() {
    let mut h = harness();
    start(&mut h);
    let events = depart(&mut h, 1);
    assert!(events.is_empty());
    assert_eq!(h.session.proctor_snapshot(at(&h, 1)).violations, 0);
}

#[tokio::test]
async fn third_violation_auto_submits_flagged_after_countdown() {
    let mut h = harness();
    start(&mut h);
    depart(&mut h, 10);
    depart(&mut h, 20);
    let events = depart(&mut h, 30);
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::Proctor(ProctorNotice::Disabled { count: 3, .. })
    )));

    // Countdown still running
    assert!(h.session.tick(at(&h, 32)).await.unwrap().is_empty());
    assert_eq!(h.session.state(), SessionState::Active);

    let events = h.session.tick(at(&h, 33)).await.unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::AutoSubmitStarted { .. })));
    let outcome = events
        .iter()
        .find_map(|e| match e {
            SessionEvent::Finished(outcome) => Some(outcome.clone()),
            _ => None,
        })
        .expect("auto-submitted");

    assert_eq!(outcome.state, SessionState::Flagged);
    assert_eq!(outcome.submission, SubmissionKind::ViolationTriggered);
    assert!(outcome.attempt.violation_triggered);
    assert!(outcome.attempt.is_flagged);
    assert_eq!(outcome.attempt.violation_count, 3);
    assert_eq!(outcome.attempt.violation_records.len(), 3);
    assert_eq!(h.attempts.attempts().len(), 1);
}

#[tokio::test]
async fn signals_after_disable_are_not_counted() {
    let mut h = harness();
    start(&mut h);
    for secs in [10, 20, 30, 31] {
        depart(&mut h, secs);
    }
    assert_eq!(h.session.proctor_snapshot(at(&h, 31)).violations, 3);
}

#[tokio::test]
async fn manual_submit_during_countdown_cancels_it_and_flags() {
    let mut h = harness();
    start(&mut h);
    answer_all(&mut h);
    for secs in [10, 20, 30] {
        depart(&mut h, secs);
    }

    let outcome = h.session.submit(at(&h, 31)).await.unwrap();
    assert_eq!(outcome.submission, SubmissionKind::Manual);
    assert!(!outcome.attempt.violation_triggered);
    assert!(outcome.attempt.is_flagged);
    assert_eq!(outcome.state, SessionState::Flagged);

    // The countdown never fires afterwards
    assert!(h.session.tick(at(&h, 40)).await.unwrap().is_empty());
    assert_eq!(h.attempts.attempts().len(), 1);
}

#[tokio::test]
async fn auto_submit_countdown_is_configurable() {
    let config = SessionConfig {
        auto_submit_countdown: Duration::from_secs(5),
        ..Default::default()
    };
    let mut h = harness_with(quiz(), MemoryAttemptSink::new(), config);
    start(&mut h);
    for secs in [10, 20, 30] {
        depart(&mut h, secs);
    }

    h.session.tick(at(&h, 33)).await.unwrap();
    assert_eq!(h.session.state(), SessionState::AutoSubmitCountdown);
    assert_eq!(
        h.session.auto_submit_remaining(at(&h, 35)),
        Some(Duration::from_secs(3))
    );
    assert!(matches!(
        h.session.submit(at(&h, 34)).await,
        Err(SessionError::InvalidTransition { .. })
    ));

    h.session.tick(at(&h, 38)).await.unwrap();
    assert_eq!(h.session.state(), SessionState::Flagged);
}

// ---------------------------------------------------------------------------
// Persistence failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn manual_persist_failure_reverts_to_active() {
    let mut h = harness_with(quiz(), MemoryAttemptSink::failing(1), SessionConfig::default());
    start(&mut h);
    answer_all(&mut h);

    let err = h.session.submit(at(&h, 20)).await.unwrap_err();
    assert!(matches!(err, SessionError::Persistence(_)));
    assert_eq!(h.session.state(), SessionState::Active);
    assert_eq!(h.attempts.calls(), 1);

    let outcome = h.session.submit(at(&h, 25)).await.unwrap();
    assert_eq!(outcome.state, SessionState::Completed);
    assert_eq!(h.attempts.attempts().len(), 1);
}

#[tokio::test]
async fn violation_triggered_persist_retries_once() {
    let mut h = harness_with(quiz(), MemoryAttemptSink::failing(1), SessionConfig::default());
    start(&mut h);
    for secs in [10, 20, 30] {
        depart(&mut h, secs);
    }

    h.session.tick(at(&h, 33)).await.unwrap();
    assert_eq!(h.session.state(), SessionState::Flagged);
    assert_eq!(h.attempts.calls(), 2);
    assert_eq!(h.attempts.attempts().len(), 1);
}

#[tokio::test]
async fn violation_triggered_persist_failure_is_fatal() {
    let mut h = harness_with(quiz(), MemoryAttemptSink::failing(2), SessionConfig::default());
    start(&mut h);
    for secs in [10, 20, 30] {
        depart(&mut h, secs);
    }

    let events = h.session.tick(at(&h, 33)).await.unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::SubmissionFailed {
            submission: SubmissionKind::ViolationTriggered,
            fatal: true,
            ..
        }
    )));
    assert_eq!(h.session.state(), SessionState::Failed);
    assert!(h.attempts.attempts().is_empty());
    assert!(h.session.outcome().is_none());
}

#[tokio::test]
async fn failed_auto_submit_still_reports_what_led_to_it() {
    let mut h = harness_with(quiz(), MemoryAttemptSink::failing(2), SessionConfig::default());
    start(&mut h);
    for secs in [10, 20, 30] {
        depart(&mut h, secs);
    }

    let events = h.session.tick(at(&h, 33)).await.unwrap();
    let exceeded = events.iter().position(|e| {
        matches!(e, SessionEvent::Proctor(ProctorNotice::ThresholdExceeded { .. }))
    });
    let started = events
        .iter()
        .position(|e| matches!(e, SessionEvent::AutoSubmitStarted { .. }));
    let failed = events
        .iter()
        .position(|e| matches!(e, SessionEvent::SubmissionFailed { .. }));
    assert!(exceeded.is_some() && started.is_some() && failed.is_some());
    assert!(exceeded < started && started < failed);
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::Finished(_))));
}

// ---------------------------------------------------------------------------
// Time limit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn time_limit_submits_without_completeness_check() {
    let timed = quiz().with_time_limit(Duration::from_secs(120));
    let mut h = harness_with(timed, MemoryAttemptSink::new(), SessionConfig::default());
    start(&mut h);
    h.session.answer(QuestionId::new("q1"), 1).unwrap();

    assert_eq!(
        h.session.time_remaining(at(&h, 100)),
        Some(Duration::from_secs(20))
    );
    assert!(h.session.tick(at(&h, 119)).await.unwrap().is_empty());

    let events = h.session.tick(at(&h, 120)).await.unwrap();
    assert!(events.contains(&SessionEvent::TimeLimitReached));
    let outcome = h.session.outcome().unwrap();
    assert_eq!(outcome.submission, SubmissionKind::TimeLimit);
    assert_eq!(outcome.state, SessionState::Completed);
    assert_eq!(outcome.attempt.answers.len(), 1);
}

#[tokio::test]
async fn time_limit_persist_failure_allows_retry_without_all_answers() {
    let timed = quiz().with_time_limit(Duration::from_secs(60));
    let mut h = harness_with(timed, MemoryAttemptSink::failing(1), SessionConfig::default());
    start(&mut h);

    let events = h.session.tick(at(&h, 60)).await.unwrap();
    assert_eq!(
        events.last(),
        Some(&SessionEvent::SubmissionFailed {
            submission: SubmissionKind::TimeLimit,
            fatal: false,
            error: "failed to save attempt, please retry: collaborator unavailable: attempt store offline"
                .into(),
        })
    );
    assert!(events.contains(&SessionEvent::TimeLimitReached));
    assert_eq!(h.session.state(), SessionState::Active);

    let outcome = h.session.submit(at(&h, 65)).await.unwrap();
    assert_eq!(outcome.submission, SubmissionKind::TimeLimit);
    assert_eq!(outcome.attempt.score, 0);
}

// ---------------------------------------------------------------------------
// Integrity review
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn failed_integrity_review_does_not_change_outcome() {
    let backend = ScriptedAiBackend::default().fail_with(UpstreamError::http(401, "bad key"));
    let pool = Arc::new(KeyPool::from_secrets(["key-one-1111"], PoolConfig::default()));
    let ai = Arc::new(AiService::new(Arc::new(backend), pool));
    let mut h = build(quiz(), MemoryAttemptSink::new(), SessionConfig::default(), Some(ai));
    start(&mut h);
    answer_all(&mut h);

    let outcome = h.session.submit(at(&h, 30)).await.unwrap();
    let verdict = h.session.take_integrity_task().unwrap().await.unwrap();
    assert!(verdict.is_none());
    assert_eq!(h.session.outcome(), Some(&outcome));
    assert_eq!(outcome.state, SessionState::Completed);
}

#[tokio::test(start_paused = true)]
async fn integrity_review_runs_after_submission() {
    let backend = Arc::new(ScriptedAiBackend::new(IntegrityVerdict {
        is_cheating: true,
        reason: "three tab switches".into(),
    }));
    let pool = Arc::new(KeyPool::from_secrets(["key-one-1111"], PoolConfig::default()));
    let ai = Arc::new(AiService::new(backend.clone(), pool));
    let mut h = build(quiz(), MemoryAttemptSink::new(), SessionConfig::default(), Some(ai));
    start(&mut h);
    answer_all(&mut h);

    h.session.submit(at(&h, 30)).await.unwrap();
    let verdict = h.session.take_integrity_task().unwrap().await.unwrap().unwrap();
    assert!(verdict.is_cheating);
    assert_eq!(backend.leases().len(), 1);
}

#[tokio::test]
async fn integrity_review_is_skipped_when_disabled() {
    let pool = Arc::new(KeyPool::from_secrets(["key-one-1111"], PoolConfig::default()));
    let ai = Arc::new(AiService::new(Arc::new(ScriptedAiBackend::default()), pool));
    let config = SessionConfig {
        integrity_recheck: false,
        ..Default::default()
    };
    let mut h = build(quiz(), MemoryAttemptSink::new(), config, Some(ai));
    start(&mut h);
    answer_all(&mut h);

    h.session.submit(at(&h, 30)).await.unwrap();
    assert!(h.session.take_integrity_task().is_none());
}
