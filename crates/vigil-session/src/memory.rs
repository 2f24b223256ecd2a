//! In-memory collaborators for tests, demos and the CLI simulator.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use vigil_keypool::{CredentialLease, UpstreamError};
use vigil_types::{AttemptSession, ViolationLogEntry};

use crate::ai::{AiBackend, IntegrityVerdict, QuizRequest};
use crate::collaborators::{AttemptSink, ViolationLogSink};
use crate::error::CollaboratorError;
use crate::quiz::{Question, Quiz};

/// Stores persisted attempts. Can be told to fail the next N writes.
#[derive(Debug, Default)]
pub struct MemoryAttemptSink {
    attempts: Mutex<Vec<AttemptSession>>,
    fail_next: AtomicU32,
    calls: AtomicU32,
}

impl MemoryAttemptSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose first `failures` writes are refused.
    pub fn failing(failures: u32) -> Self {
        let sink = Self::default();
        sink.fail_next(failures);
        sink
    }

    pub fn fail_next(&self, failures: u32) {
        self.fail_next.store(failures, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> Vec<AttemptSession> {
        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of persist calls, successful or not.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttemptSink for MemoryAttemptSink {
    async fn persist(&self, attempt: &AttemptSession) -> Result<(), CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(CollaboratorError::Unavailable("attempt store offline".into()));
        }
        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(attempt.clone());
        Ok(())
    }
}

/// Collects violation log posts.
#[derive(Debug, Default)]
pub struct MemoryViolationLog {
    entries: Mutex<Vec<ViolationLogEntry>>,
}

impl MemoryViolationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ViolationLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ViolationLogSink for MemoryViolationLog {
    async fn post(&self, entry: &ViolationLogEntry) -> Result<(), CollaboratorError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());
        Ok(())
    }
}

/// AI backend answering from fixed data, after replaying scripted failures.
#[derive(Debug)]
pub struct ScriptedAiBackend {
    verdict: IntegrityVerdict,
    failures: Mutex<VecDeque<UpstreamError>>,
    leases: Mutex<Vec<String>>,
}

impl ScriptedAiBackend {
    pub fn new(verdict: IntegrityVerdict) -> Self {
        Self {
            verdict,
            failures: Mutex::new(VecDeque::new()),
            leases: Mutex::new(Vec::new()),
        }
    }

    /// Queue a failure returned by the next call.
    pub fn fail_with(self, error: UpstreamError) -> Self {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(error);
        self
    }

    /// Labels of the credentials used, in call order.
    pub fn leases(&self) -> Vec<String> {
        self.leases
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn next(&self, lease: &CredentialLease) -> Result<(), UpstreamError> {
        self.leases
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(lease.label.clone());
        match self
            .failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for ScriptedAiBackend {
    fn default() -> Self {
        Self::new(IntegrityVerdict {
            is_cheating: false,
            reason: "no anomalies".into(),
        })
    }
}

#[async_trait]
impl AiBackend for ScriptedAiBackend {
    async fn generate_quiz(
        &self,
        lease: &CredentialLease,
        request: &QuizRequest,
    ) -> Result<Quiz, UpstreamError> {
        self.next(lease)?;
        let questions = (1..=request.question_count)
            .map(|n| {
                Question::new(
                    format!("q{}", n),
                    format!("{} question {}", request.topic, n),
                    vec!["A".into(), "B".into(), "C".into(), "D".into()],
                    0,
                )
            })
            .collect();
        Ok(Quiz::new(
            format!("generated-{}", request.topic.to_ascii_lowercase().replace(' ', "-")),
            request.topic.clone(),
            questions,
        ))
    }

    async fn review_integrity(
        &self,
        lease: &CredentialLease,
        _attempt: &AttemptSession,
    ) -> Result<IntegrityVerdict, UpstreamError> {
        self.next(lease)?;
        Ok(self.verdict.clone())
    }
}
