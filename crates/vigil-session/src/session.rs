//! Quiz session state machine.
//!
//! ```text
//! CollectingIdentity ─► Briefing ─► Active ─────────────► Persisting ─► Completed
//!                                     │   manual/time limit      ▲   └─► Flagged
//!                                     ▼                          │   └─► Failed
//!                              AutoSubmitCountdown ──────────────┘
//!                                      (violation-triggered)
//! ```
//!
//! The session owns the attempt's [`ProctorEngine`] and a [`Scheduler`] for
//! its own timers. Hosts drive it with `handle_event` and `tick(now)`; the
//! only suspension points are collaborator calls.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use vigil_detect::PageEvent;
use vigil_proctor::{ProctorEngine, ProctorNotice, ProctorSnapshot, Scheduler, TaskPurpose};
use vigil_types::{
    AnswerChoice, AttemptId, AttemptSession, QuestionId, StudentIdentity, ViolationLogEntry,
};

use crate::ai::IntegrityVerdict;
use crate::collaborators::Collaborators;
use crate::error::{SessionError, SessionResult};
use crate::quiz::Quiz;
use crate::scoring;

/// Where the attempt is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    CollectingIdentity,
    Briefing,
    Active,
    AutoSubmitCountdown,
    Persisting,
    Completed,
    Flagged,
    /// A violation-triggered submission could not be saved.
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Flagged | SessionState::Failed
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::CollectingIdentity => "collecting identity",
            SessionState::Briefing => "briefing",
            SessionState::Active => "active",
            SessionState::AutoSubmitCountdown => "auto-submit countdown",
            SessionState::Persisting => "persisting",
            SessionState::Completed => "completed",
            SessionState::Flagged => "flagged",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a submission was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    Manual,
    TimeLimit,
    ViolationTriggered,
}

/// Session tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Extra countdown after the escalation countdown before auto-submitting.
    pub auto_submit_countdown: Duration,

    /// Retries for a failed violation-triggered save.
    pub violation_persist_retries: u32,

    /// Run the AI integrity review after a successful save.
    pub integrity_recheck: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_submit_countdown: Duration::ZERO,
            violation_persist_retries: 1,
            integrity_recheck: true,
        }
    }
}

/// Final result of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub state: SessionState,
    pub submission: SubmissionKind,
    pub attempt: AttemptSession,
}

/// Something the host should show or know about.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Proctor(ProctorNotice),
    AutoSubmitStarted { deadline: DateTime<Utc> },
    TimeLimitReached,
    Finished(Box<SessionOutcome>),
    /// A scheduled submission could not be persisted. `fatal` means the
    /// attempt is now `Failed`; otherwise it stays open for a retry.
    SubmissionFailed {
        submission: SubmissionKind,
        fatal: bool,
        error: String,
    },
}

/// Result of forwarding a page event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionResponse {
    pub suppress_default: bool,
    pub events: Vec<SessionEvent>,
}

/// One student's attempt at one quiz.
pub struct QuizSession {
    id: AttemptId,
    quiz: Arc<Quiz>,
    state: SessionState,
    identity: Option<StudentIdentity>,
    started_at: Option<DateTime<Utc>>,
    answers: BTreeMap<QuestionId, AnswerChoice>,
    time_expired: bool,
    proctor: ProctorEngine,
    scheduler: Scheduler,
    collaborators: Collaborators,
    config: SessionConfig,
    outcome: Option<SessionOutcome>,
    integrity_task: Option<JoinHandle<Option<IntegrityVerdict>>>,
}

impl QuizSession {
    pub fn new(
        quiz: Arc<Quiz>,
        proctor: ProctorEngine,
        collaborators: Collaborators,
        config: SessionConfig,
    ) -> Self {
        Self {
            id: proctor.attempt_id(),
            quiz,
            state: SessionState::CollectingIdentity,
            identity: None,
            started_at: None,
            answers: BTreeMap::new(),
            time_expired: false,
            proctor,
            scheduler: Scheduler::new(),
            collaborators,
            config,
            outcome: None,
            integrity_task: None,
        }
    }

    pub fn id(&self) -> AttemptId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn answers(&self) -> &BTreeMap<QuestionId, AnswerChoice> {
        &self.answers
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn proctor_snapshot(&self, now: DateTime<Utc>) -> ProctorSnapshot {
        self.proctor.snapshot(now)
    }

    /// Time left on the quiz's time limit.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.scheduler.remaining(TaskPurpose::TimeLimit, now)
    }

    /// Seconds left before auto-submission, while counting down.
    pub fn auto_submit_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.scheduler.remaining(TaskPurpose::AutoSubmit, now)
    }

    /// Take the handle of the spawned integrity review, if one was started.
    pub fn take_integrity_task(&mut self) -> Option<JoinHandle<Option<IntegrityVerdict>>> {
        self.integrity_task.take()
    }

    fn require(&self, state: SessionState, action: &'static str) -> SessionResult<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                state: self.state,
                action,
            })
        }
    }

    /// `CollectingIdentity → Briefing`.
    pub fn submit_identity(&mut self, name: &str, registration_id: &str) -> SessionResult<()> {
        self.require(SessionState::CollectingIdentity, "submit identity")?;
        let identity =
            StudentIdentity::new(name, registration_id).ok_or(SessionError::InvalidIdentity)?;
        info!(attempt_id = %self.id, registration_id = %identity.registration_id, "Identity collected");
        self.identity = Some(identity);
        self.state = SessionState::Briefing;
        Ok(())
    }

    /// `Briefing → Active`: arm proctoring and start the time limit.
    pub fn acknowledge(&mut self, now: DateTime<Utc>) -> SessionResult<Vec<SessionEvent>> {
        self.require(SessionState::Briefing, "start the quiz")?;
        let notices = self.proctor.arm(now)?;
        self.started_at = Some(now);
        self.state = SessionState::Active;
        if let Some(limit) = self.quiz.time_limit {
            self.scheduler.schedule_after(TaskPurpose::TimeLimit, now, limit);
        }
        info!(
            attempt_id = %self.id,
            quiz_id = %self.quiz.id,
            questions = self.quiz.len(),
            time_limit_secs = self.quiz.time_limit.map(|d| d.as_secs()),
            "Attempt started"
        );
        Ok(self.relay(notices))
    }

    /// Record an answer. Only while active.
    pub fn answer(&mut self, question: QuestionId, choice: AnswerChoice) -> SessionResult<()> {
        self.require(SessionState::Active, "answer")?;
        let known = self
            .quiz
            .question(&question)
            .ok_or_else(|| SessionError::UnknownQuestion(question.clone()))?;
        if !known.accepts(choice) {
            return Err(SessionError::InvalidChoice { question, choice });
        }
        self.answers.insert(question, choice);
        Ok(())
    }

    /// Forward a page event to proctoring.
    pub fn handle_event(&mut self, event: &PageEvent, now: DateTime<Utc>) -> SessionResponse {
        let monitoring = matches!(
            self.state,
            SessionState::Active | SessionState::AutoSubmitCountdown
        );
        if !monitoring {
            return SessionResponse::default();
        }
        let response = self.proctor.handle_event(event, now);
        SessionResponse {
            suppress_default: response.suppress_default,
            events: self.relay(response.notices),
        }
    }

    /// Advance time: proctor timers, the time limit and auto-submission.
    ///
    /// A scheduled submission that fails to persist is reported as
    /// [`SessionEvent::SubmissionFailed`] after the events that led to it.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> SessionResult<Vec<SessionEvent>> {
        let mut events = Vec::new();
        if !matches!(
            self.state,
            SessionState::Active | SessionState::AutoSubmitCountdown
        ) {
            return Ok(events);
        }

        let notices = self.proctor.tick(now);
        let exceeded = notices
            .iter()
            .any(|n| matches!(n, ProctorNotice::ThresholdExceeded { .. }));
        events.extend(self.relay(notices));

        if exceeded && self.state == SessionState::Active {
            self.state = SessionState::AutoSubmitCountdown;
            self.scheduler.cancel(TaskPurpose::TimeLimit);
            self.scheduler
                .schedule_after(TaskPurpose::AutoSubmit, now, self.config.auto_submit_countdown);
            let deadline = self
                .scheduler
                .deadline(TaskPurpose::AutoSubmit)
                .unwrap_or(now);
            warn!(attempt_id = %self.id, deadline = %deadline, "Auto-submission scheduled");
            events.push(SessionEvent::AutoSubmitStarted { deadline });
        }

        for purpose in self.scheduler.due(now) {
            match purpose {
                TaskPurpose::TimeLimit if self.state == SessionState::Active => {
                    info!(attempt_id = %self.id, "Time limit reached");
                    events.push(SessionEvent::TimeLimitReached);
                    self.time_expired = true;
                    let result = self.submit_as(SubmissionKind::TimeLimit, now).await;
                    events.push(Self::settled(SubmissionKind::TimeLimit, result));
                }
                TaskPurpose::AutoSubmit if self.state == SessionState::AutoSubmitCountdown => {
                    let result = self.submit_as(SubmissionKind::ViolationTriggered, now).await;
                    events.push(Self::settled(SubmissionKind::ViolationTriggered, result));
                }
                other => debug!(purpose = %other, state = %self.state, "Stale session task"),
            }
        }

        Ok(events)
    }

    /// Manual submission. Every question must be answered unless the time
    /// limit already ran out.
    pub async fn submit(&mut self, now: DateTime<Utc>) -> SessionResult<SessionOutcome> {
        self.require(SessionState::Active, "submit")?;
        if !self.time_expired {
            let missing = scoring::unanswered(&self.quiz, &self.answers);
            if !missing.is_empty() {
                return Err(SessionError::Incomplete {
                    unanswered: missing.len(),
                    total: self.quiz.len(),
                });
            }
        }
        let kind = if self.time_expired {
            SubmissionKind::TimeLimit
        } else {
            SubmissionKind::Manual
        };
        self.submit_as(kind, now).await
    }

    fn build_attempt(&self, violation_triggered: bool, now: DateTime<Utc>) -> SessionResult<AttemptSession> {
        let identity = self.identity.clone().ok_or(SessionError::InvalidIdentity)?;
        let records = self.proctor.records().to_vec();
        let violation_count = u32::try_from(records.len()).unwrap_or(u32::MAX);
        let max_violations = self.proctor.config().escalation.max_violations;
        let is_flagged =
            AttemptSession::flag_predicate(violation_triggered, violation_count, max_violations);

        Ok(AttemptSession {
            id: self.id,
            quiz_id: self.quiz.id.clone(),
            student_identity: identity,
            started_at: self.started_at.unwrap_or(now),
            submitted_at: now,
            answers: self.answers.clone(),
            violation_records: records,
            violation_count,
            violation_triggered,
            score: scoring::score(&self.quiz, &self.answers),
            status: AttemptSession::status_for(is_flagged),
            is_flagged,
        })
    }

    #[instrument(skip(self, now), fields(attempt_id = %self.id))]
    async fn submit_as(&mut self, kind: SubmissionKind, now: DateTime<Utc>) -> SessionResult<SessionOutcome> {
        let violation_triggered = kind == SubmissionKind::ViolationTriggered;
        let attempt = self.build_attempt(violation_triggered, now)?;
        let previous = self.state;
        self.state = SessionState::Persisting;

        let attempts = if violation_triggered {
            1 + self.config.violation_persist_retries
        } else {
            1
        };

        let mut last_error = None;
        for attempt_no in 1..=attempts {
            match self.collaborators.attempts.persist(&attempt).await {
                Ok(()) => {
                    last_error = None;
                    break;
                }
                Err(e) => {
                    warn!(attempt_no, error = %e, "Failed to persist attempt");
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            if violation_triggered {
                error!(attempts, error = %e, "Violation-triggered submission lost");
                self.state = SessionState::Failed;
                self.shutdown();
                return Err(SessionError::PersistenceFatal { attempts, source: e });
            }
            // Manual path: back to where the student can retry
            self.state = previous;
            return Err(SessionError::Persistence(e));
        }

        self.state = if attempt.is_flagged {
            SessionState::Flagged
        } else {
            SessionState::Completed
        };
        info!(
            state = %self.state,
            submission = ?kind,
            score = attempt.score,
            violations = attempt.violation_count,
            "Attempt submitted"
        );

        if !violation_triggered {
            self.proctor.cancel_countdown();
        }
        self.shutdown();
        self.spawn_integrity_review(&attempt);

        let outcome = SessionOutcome {
            state: self.state,
            submission: kind,
            attempt,
        };
        self.outcome = Some(outcome.clone());
        Ok(outcome)
    }

    fn shutdown(&mut self) {
        self.scheduler.cancel_all();
        self.proctor.teardown();
    }

    fn spawn_integrity_review(&mut self, attempt: &AttemptSession) {
        if !self.config.integrity_recheck {
            return;
        }
        let Some(ai) = self.collaborators.integrity.clone() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No async runtime, skipping integrity review");
            return;
        };
        let attempt = attempt.clone();
        self.integrity_task = Some(runtime.spawn(async move {
            match ai.review_integrity(&attempt).await {
                Ok(verdict) => {
                    info!(
                        attempt_id = %attempt.id,
                        is_cheating = verdict.is_cheating,
                        reason = %verdict.reason,
                        "Integrity review finished"
                    );
                    Some(verdict)
                }
                Err(e) => {
                    warn!(attempt_id = %attempt.id, error = %e, "Integrity review failed");
                    None
                }
            }
        }));
    }

    /// Wrap proctor notices, posting violation logs on the side.
    fn settled(submission: SubmissionKind, result: SessionResult<SessionOutcome>) -> SessionEvent {
        match result {
            Ok(outcome) => SessionEvent::Finished(Box::new(outcome)),
            Err(e) => SessionEvent::SubmissionFailed {
                submission,
                fatal: matches!(e, SessionError::PersistenceFatal { .. }),
                error: e.to_string(),
            },
        }
    }

    fn relay(&self, notices: Vec<ProctorNotice>) -> Vec<SessionEvent> {
        for notice in &notices {
            if let ProctorNotice::ViolationLog(entry) = notice {
                self.post_log(entry.clone());
            }
        }
        notices.into_iter().map(SessionEvent::Proctor).collect()
    }

    fn post_log(&self, entry: ViolationLogEntry) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(kind = %entry.kind, "No async runtime, violation log not posted");
            return;
        };
        let sink = Arc::clone(&self.collaborators.violation_log);
        runtime.spawn(async move {
            if let Err(e) = sink.post(&entry).await {
                debug!(kind = %entry.kind, error = %e, "Violation log post failed");
            }
        });
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("id", &self.id)
            .field("quiz_id", &self.quiz.id)
            .field("state", &self.state)
            .field("answers", &self.answers.len())
            .field("proctor", &self.proctor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Flagged.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Persisting.is_terminal());
        assert!(!SessionState::AutoSubmitCountdown.is_terminal());
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: SessionConfig = serde_json::from_str(r#"{"integrity_recheck": false}"#).unwrap();
        assert_eq!(config.auto_submit_countdown, Duration::ZERO);
        assert_eq!(config.violation_persist_retries, 1);
        assert!(!config.integrity_recheck);
    }

    #[test]
    fn transition_error_names_the_state() {
        let err = SessionError::InvalidTransition {
            state: SessionState::AutoSubmitCountdown,
            action: "submit",
        };
        assert_eq!(err.to_string(), "cannot submit while auto-submit countdown");
    }
}
