//! # Vigil Session - Quiz Attempt Lifecycle
//!
//! Owns one student's attempt from identity collection to a persisted,
//! possibly flagged, [`AttemptSession`](vigil_types::AttemptSession).
//!
//! - [`QuizSession`]: the attempt state machine, wrapping a
//!   [`ProctorEngine`](vigil_proctor::ProctorEngine)
//! - [`AttemptSink`] / [`ViolationLogSink`]: persistence and logging seams
//! - [`AiService`]: quiz generation and post-hoc integrity review, with
//!   credential failover through [`vigil_keypool::KeyPool`]
//! - [`memory`]: in-memory collaborators
//!
//! Submission rules:
//!
//! | Trigger              | Completeness check | Persist retries | On failure          |
//! |----------------------|--------------------|-----------------|---------------------|
//! | Manual               | yes                | 0               | back to `Active`    |
//! | Time limit           | no                 | 0               | back to `Active`    |
//! | Violation-triggered  | no                 | 1 (configurable)| `Failed`            |

#![deny(unsafe_code)]

pub mod ai;
pub mod collaborators;
pub mod error;
pub mod memory;
pub mod quiz;
pub mod scoring;
pub mod session;

pub use ai::{AiBackend, AiService, IntegrityVerdict, QuizRequest};
pub use collaborators::{AttemptSink, Collaborators, ViolationLogSink};
pub use error::{CollaboratorError, SessionError, SessionResult};
pub use memory::{MemoryAttemptSink, MemoryViolationLog, ScriptedAiBackend};
pub use quiz::{Question, Quiz};
pub use scoring::{score, unanswered};
pub use session::{
    QuizSession, SessionConfig, SessionEvent, SessionOutcome, SessionResponse, SessionState,
    SubmissionKind,
};
