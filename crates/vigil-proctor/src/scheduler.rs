//! Cooperative scheduler - named, cancellable deadlines
//!
//! Every timer in an attempt (grace window, automation scan, escalation
//! countdown, time limit, auto-submit countdown) is a pending task keyed by
//! its [`TaskPurpose`]. Nothing runs on its own: the owner calls
//! [`Scheduler::due`] from its `tick(now)` and acts on what expired.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;
use vigil_types::elapsed_between;

/// What a scheduled task is for. At most one task per purpose is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPurpose {
    GraceWindowEnd,
    AutomationScan,
    EscalationCountdown,
    TimeLimit,
    AutoSubmit,
}

impl fmt::Display for TaskPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskPurpose::GraceWindowEnd => "grace_window_end",
            TaskPurpose::AutomationScan => "automation_scan",
            TaskPurpose::EscalationCountdown => "escalation_countdown",
            TaskPurpose::TimeLimit => "time_limit",
            TaskPurpose::AutoSubmit => "auto_submit",
        };
        f.write_str(name)
    }
}

/// Pending deadlines keyed by purpose.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    pending: HashMap<TaskPurpose, DateTime<Utc>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `purpose` at `deadline`, replacing any pending task of the
    /// same purpose. Returns the replaced deadline.
    pub fn schedule(&mut self, purpose: TaskPurpose, deadline: DateTime<Utc>) -> Option<DateTime<Utc>> {
        trace!(purpose = %purpose, deadline = %deadline, "Task scheduled");
        self.pending.insert(purpose, deadline)
    }

    /// Schedule `purpose` to fire `after` from `now`.
    pub fn schedule_after(
        &mut self,
        purpose: TaskPurpose,
        now: DateTime<Utc>,
        after: Duration,
    ) -> Option<DateTime<Utc>> {
        let after = chrono::Duration::from_std(after).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let deadline = now.checked_add_signed(after).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.schedule(purpose, deadline)
    }

    /// Cancel a pending task. Returns whether one was pending.
    pub fn cancel(&mut self, purpose: TaskPurpose) -> bool {
        self.pending.remove(&purpose).is_some()
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, purpose: TaskPurpose) -> bool {
        self.pending.contains_key(&purpose)
    }

    pub fn deadline(&self, purpose: TaskPurpose) -> Option<DateTime<Utc>> {
        self.pending.get(&purpose).copied()
    }

    /// Time left before `purpose` fires, zero if overdue.
    pub fn remaining(&self, purpose: TaskPurpose, now: DateTime<Utc>) -> Option<Duration> {
        self.deadline(purpose)
            .map(|deadline| elapsed_between(now, deadline))
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.pending.values().min().copied()
    }

    /// Remove and return every task whose deadline has passed, earliest first.
    /// Ties are broken by purpose so the order is deterministic.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<TaskPurpose> {
        let mut expired: Vec<(DateTime<Utc>, TaskPurpose)> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(purpose, deadline)| (*deadline, *purpose))
            .collect();
        expired.sort();

        for (_, purpose) in &expired {
            self.pending.remove(purpose);
        }
        expired.into_iter().map(|(_, purpose)| purpose).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
