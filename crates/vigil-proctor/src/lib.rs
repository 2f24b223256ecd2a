//! # Vigil Proctor - Violation Escalation
//!
//! Turns the raw signals produced by `vigil-detect` into deterministic
//! escalation decisions for one quiz attempt.
//!
//! ## Pipeline
//!
//! ```text
//! DetectorSet ──signals──► ViolationAggregator ──records──► EscalationMachine
//!                              (platform policy)              (one-shot disable,
//!                                                               countdown)
//! ```
//!
//! - [`ViolationAggregator`]: desktop counts every signal after the grace
//!   window; mobile debounces tab switches into warnings and collapses them
//! - [`EscalationMachine`]: disables the attempt exactly once when the
//!   violation count reaches `max_violations`, then runs a visible countdown
//! - [`Scheduler`]: every timer is a named task the owner drives with `tick(now)`
//! - [`ProctorEngine`]: wires all of the above to a detector set
//!
//! Nothing here spawns threads or reads the wall clock: callers pass `now`.

#![deny(unsafe_code)]

pub mod aggregator;
pub mod config;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod scheduler;

pub use aggregator::{AggregateOutcome, IgnoreReason, ViolationAggregator};
pub use config::{DesktopPolicy, EscalationConfig, MobilePolicy, ProctorConfig, WarningDecay};
pub use engine::{EventResponse, PageContext, ProctorEngine, ProctorNotice, ProctorSnapshot};
pub use error::{ProctorError, ProctorResult};
pub use escalation::{EscalationEvent, EscalationMachine, EscalationPhase, EscalationStep};
pub use scheduler::{Scheduler, TaskPurpose};
