//! Vigil Types - Shared data model for quiz attempt integrity
//!
//! Vigil watches a quiz attempt running in an environment the operator does
//! not control (the student's browser) and turns noisy integrity signals into
//! deterministic escalation decisions.
//!
//! ## Key Concepts
//!
//! - **ViolationSignal**: Raw, ephemeral observation emitted by a detector
//! - **ViolationRecord**: Categorized, append-only entry counted toward termination
//! - **AttemptSession**: The persisted, write-once shape of a finished attempt
//! - **ViolationLogEntry**: Fire-and-forget telemetry posted per violation
//! - **Clock**: Injected time source so every policy is testable
//!
//! ## Data Flow
//!
//! ```text
//! detector ──ViolationSignal──► aggregator ──ViolationRecord──► escalation
//!                                                                  │
//!                                           AttemptSession ◄── session
//! ```

#![deny(unsafe_code)]

pub mod attempt;
pub mod clock;
pub mod events;
pub mod ids;
pub mod platform;
pub mod record;
pub mod signal;

// Re-export main types
pub use attempt::{AnswerChoice, AttemptSession, AttemptStatus, StudentIdentity};
pub use clock::{elapsed_between, Clock, ManualClock, SystemClock};
pub use events::ViolationLogEntry;
pub use ids::{AttemptId, QuestionId, QuizId};
pub use platform::{OsFamily, Platform};
pub use record::{ViolationCategory, ViolationLedger, ViolationRecord};
pub use signal::{SignalKind, ViolationSignal};
