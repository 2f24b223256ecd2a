//! Escalation state machine.
//!
//! Tracks the cumulative violation records of an attempt and disables it
//! when the count reaches `max_violations`. Disabling is one-shot: the
//! transition and the countdown that follows happen exactly once, and every
//! later record is a no-op.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vigil_types::{elapsed_between, ViolationLedger, ViolationRecord};

use crate::config::EscalationConfig;

/// Phase of the escalation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "count", rename_all = "snake_case")]
pub enum EscalationPhase {
    /// Not monitoring.
    Disarmed,
    /// Monitoring, nothing counted yet.
    Armed,
    /// Warnings pending, no violations.
    Warning(u32),
    /// Violations counted, below the threshold.
    Violating(u32),
    /// Threshold reached; the countdown is running or has fired.
    Disabled,
}

impl fmt::Display for EscalationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscalationPhase::Disarmed => write!(f, "disarmed"),
            EscalationPhase::Armed => write!(f, "armed"),
            EscalationPhase::Warning(n) => write!(f, "warning({})", n),
            EscalationPhase::Violating(n) => write!(f, "violating({})", n),
            EscalationPhase::Disabled => write!(f, "disabled"),
        }
    }
}

/// Result of recording a violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationStep {
    /// Record ignored: not armed, or already disabled.
    Ignored,
    /// Record appended below the threshold.
    Recorded { count: u32 },
    /// Record appended and the threshold reached.
    Disabled { count: u32, deadline: DateTime<Utc> },
}

/// Emitted once when the countdown reaches zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationEvent {
    ThresholdExceeded { records: Vec<ViolationRecord> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Countdown {
    Idle,
    Running { deadline: DateTime<Utc> },
    Cancelled,
    Fired,
}

/// Escalation state for one attempt.
#[derive(Debug, Clone)]
pub struct EscalationMachine {
    config: EscalationConfig,
    armed: bool,
    ledger: ViolationLedger,
    warnings: u32,
    disabled_at: Option<DateTime<Utc>>,
    countdown: Countdown,
}

impl EscalationMachine {
    pub fn new(config: EscalationConfig) -> Self {
        Self {
            config,
            armed: false,
            ledger: ViolationLedger::new(),
            warnings: 0,
            disabled_at: None,
            countdown: Countdown::Idle,
        }
    }

    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn max_violations(&self) -> u32 {
        self.config.max_violations
    }

    pub fn phase(&self) -> EscalationPhase {
        if self.disabled_at.is_some() {
            EscalationPhase::Disabled
        } else if !self.armed {
            EscalationPhase::Disarmed
        } else if !self.ledger.is_empty() {
            EscalationPhase::Violating(self.violation_count())
        } else if self.warnings > 0 {
            EscalationPhase::Warning(self.warnings)
        } else {
            EscalationPhase::Armed
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled_at.is_some()
    }

    pub fn violation_count(&self) -> u32 {
        u32::try_from(self.ledger.len()).unwrap_or(u32::MAX)
    }

    pub fn records(&self) -> &[ViolationRecord] {
        self.ledger.as_slice()
    }

    pub fn warnings(&self) -> u32 {
        self.warnings
    }

    /// Mirror the aggregator's live warning count. Frozen once disabled.
    pub fn observe_warnings(&mut self, warnings: u32) {
        if self.armed && !self.is_disabled() {
            self.warnings = warnings;
        }
    }

    /// Append a counted violation and check the threshold.
    pub fn record(&mut self, record: ViolationRecord, now: DateTime<Utc>) -> EscalationStep {
        if !self.armed || self.is_disabled() {
            return EscalationStep::Ignored;
        }

        self.ledger.append(record);
        let count = self.violation_count();

        if count < self.config.max_violations {
            return EscalationStep::Recorded { count };
        }

        let deadline = now
            + chrono::Duration::from_std(self.config.countdown).unwrap_or(chrono::Duration::zero());
        self.disabled_at = Some(now);
        self.countdown = Countdown::Running { deadline };
        warn!(
            violations = count,
            max_violations = self.config.max_violations,
            countdown_secs = self.config.countdown.as_secs(),
            "Violation threshold reached, attempt disabled"
        );
        EscalationStep::Disabled { count, deadline }
    }

    /// Countdown deadline while it is running.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        match self.countdown {
            Countdown::Running { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Whole seconds left on the countdown, rounded up, for display.
    pub fn countdown_remaining(&self, now: DateTime<Utc>) -> Option<u64> {
        self.deadline().map(|deadline| {
            let left = elapsed_between(now, deadline);
            let secs = left.as_secs();
            if left > Duration::from_secs(secs) {
                secs + 1
            } else {
                secs
            }
        })
    }

    /// Fire the countdown if it has run out. Yields the event exactly once.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<EscalationEvent> {
        let Countdown::Running { deadline } = self.countdown else {
            return None;
        };
        if now < deadline {
            return None;
        }
        self.countdown = Countdown::Fired;
        info!(violations = self.violation_count(), "Escalation countdown elapsed");
        Some(EscalationEvent::ThresholdExceeded {
            records: self.ledger.to_vec(),
        })
    }

    pub fn has_fired(&self) -> bool {
        self.countdown == Countdown::Fired
    }

    /// Cancel a running countdown. Only a normal submission does this, and
    /// never after the countdown has fired.
    pub fn cancel(&mut self) -> bool {
        match self.countdown {
            Countdown::Running { .. } => {
                self.countdown = Countdown::Cancelled;
                info!("Escalation countdown cancelled by submission");
                true
            }
            _ => false,
        }
    }

    /// Drop all state.
    pub fn teardown(&mut self) {
        self.armed = false;
        self.ledger = ViolationLedger::new();
        self.warnings = 0;
        self.disabled_at = None;
        self.countdown = Countdown::Idle;
    }
}
