//! Proctor engine: detectors → aggregator → escalation, driven by a scheduler.
//!
//! The engine is synchronous. The host forwards page events through
//! [`ProctorEngine::handle_event`] and calls [`ProctorEngine::tick`] from its
//! timer loop; both return [`ProctorNotice`]s for the owner to act on.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use vigil_detect::{DetectorEnv, DetectorProfile, DetectorSet, PageEvent};
use vigil_types::{AttemptId, Platform, ViolationLogEntry, ViolationRecord, ViolationSignal};

use crate::aggregator::{AggregateOutcome, ViolationAggregator};
use crate::config::ProctorConfig;
use crate::error::{ProctorError, ProctorResult};
use crate::escalation::{EscalationEvent, EscalationMachine, EscalationPhase, EscalationStep};
use crate::scheduler::{Scheduler, TaskPurpose};

/// Page the attempt runs in, copied into violation log entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext {
    pub user_agent: String,
    pub url: String,
}

impl PageContext {
    pub fn new(user_agent: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            url: url.into(),
        }
    }
}

/// Something the owner of the engine must know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProctorNotice {
    /// A mobile warning was added.
    Warning { warnings: u32 },

    /// A violation was counted.
    Violation { record: ViolationRecord, count: u32 },

    /// Outbound log entry for a counted violation.
    ViolationLog(ViolationLogEntry),

    /// The threshold was reached and the countdown started.
    Disabled { count: u32, countdown: Duration },

    /// The countdown elapsed. Emitted once.
    ThresholdExceeded { records: Vec<ViolationRecord> },
}

/// Result of forwarding one page event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventResponse {
    /// The browser's default action must be prevented.
    pub suppress_default: bool,

    pub notices: Vec<ProctorNotice>,
}

/// Live counts for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProctorSnapshot {
    pub attempt_id: AttemptId,
    pub platform: Platform,
    pub phase: EscalationPhase,
    pub warnings: u32,
    pub violations: u32,
    pub max_violations: u32,
    pub countdown_remaining: Option<u64>,
    pub records: Vec<ViolationRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Armed,
    TornDown,
}

/// Integrity engine for one attempt.
pub struct ProctorEngine {
    attempt_id: AttemptId,
    config: ProctorConfig,
    page: PageContext,
    env: DetectorEnv,
    detectors: DetectorSet,
    aggregator: ViolationAggregator,
    escalation: EscalationMachine,
    scheduler: Scheduler,
    lifecycle: Lifecycle,
}

impl ProctorEngine {
    /// Build an engine for the given profile. Nothing is mounted until
    /// [`ProctorEngine::arm`].
    pub fn new(
        attempt_id: AttemptId,
        profile: DetectorProfile,
        env: DetectorEnv,
        page: PageContext,
        config: ProctorConfig,
    ) -> ProctorResult<Self> {
        config.validate()?;
        let detectors = profile.build(&config.detectors);
        let aggregator = ViolationAggregator::new(profile.platform(), &config);
        let escalation = EscalationMachine::new(config.escalation.clone());

        Ok(Self {
            attempt_id,
            config,
            page,
            env,
            detectors,
            aggregator,
            escalation,
            scheduler: Scheduler::new(),
            lifecycle: Lifecycle::Idle,
        })
    }

    /// Build an engine choosing the profile from the page's user agent.
    pub fn for_page(
        attempt_id: AttemptId,
        env: DetectorEnv,
        page: PageContext,
        config: ProctorConfig,
    ) -> ProctorResult<Self> {
        let profile = DetectorProfile::from_user_agent(&page.user_agent);
        Self::new(attempt_id, profile, env, page, config)
    }

    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    pub fn platform(&self) -> Platform {
        self.aggregator.platform()
    }

    pub fn config(&self) -> &ProctorConfig {
        &self.config
    }

    pub fn phase(&self) -> EscalationPhase {
        self.escalation.phase()
    }

    pub fn records(&self) -> &[ViolationRecord] {
        self.escalation.records()
    }

    pub fn violation_count(&self) -> u32 {
        self.escalation.violation_count()
    }

    pub fn is_armed(&self) -> bool {
        self.lifecycle == Lifecycle::Armed
    }

    /// Mount the detectors and start monitoring.
    #[instrument(skip(self), fields(attempt_id = %self.attempt_id))]
    pub fn arm(&mut self, now: DateTime<Utc>) -> ProctorResult<Vec<ProctorNotice>> {
        match self.lifecycle {
            Lifecycle::Armed => return Err(ProctorError::AlreadyArmed),
            Lifecycle::TornDown => return Err(ProctorError::TornDown),
            Lifecycle::Idle => {}
        }
        self.lifecycle = Lifecycle::Armed;
        self.aggregator.arm(now);
        self.escalation.arm();

        let platform = self.platform();
        self.scheduler.schedule_after(
            TaskPurpose::GraceWindowEnd,
            now,
            self.config.grace_period(platform),
        );
        self.scheduler.schedule_after(
            TaskPurpose::AutomationScan,
            now,
            self.detectors.scan_interval(),
        );

        let initial = self.detectors.mount(&self.env, now);
        info!(
            platform = %platform,
            max_violations = self.escalation.max_violations(),
            "Proctoring armed"
        );
        Ok(self.ingest_all(initial, now))
    }

    /// Forward a page event.
    pub fn handle_event(&mut self, event: &PageEvent, now: DateTime<Utc>) -> EventResponse {
        if !self.is_armed() {
            return EventResponse::default();
        }
        let detection = self.detectors.handle(event, now);
        EventResponse {
            suppress_default: detection.suppress_default,
            notices: self.ingest_all(detection.signals, now),
        }
    }

    /// Advance time: collect queued signals and run every due task.
    ///
    /// Queued signals keep the timestamp they were raised with. The grace
    /// window and the mobile buffer judge them at that time, not at `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<ProctorNotice> {
        if !self.is_armed() {
            return Vec::new();
        }

        let queued = self.detectors.poll(now);
        let mut notices = self.ingest_all(queued, now);

        for purpose in self.scheduler.due(now) {
            match purpose {
                TaskPurpose::GraceWindowEnd => {
                    debug!(attempt_id = %self.attempt_id, "Grace window over");
                }
                TaskPurpose::AutomationScan => {
                    let found = self.detectors.scan(&self.env, now);
                    notices.extend(self.ingest_all(found, now));
                    if !self.escalation.is_disabled() {
                        self.scheduler.schedule_after(
                            TaskPurpose::AutomationScan,
                            now,
                            self.detectors.scan_interval(),
                        );
                    }
                }
                TaskPurpose::EscalationCountdown => {
                    if let Some(EscalationEvent::ThresholdExceeded { records }) =
                        self.escalation.tick(now)
                    {
                        warn!(
                            attempt_id = %self.attempt_id,
                            violations = records.len(),
                            "Violation threshold exceeded"
                        );
                        notices.push(ProctorNotice::ThresholdExceeded { records });
                    }
                }
                TaskPurpose::TimeLimit | TaskPurpose::AutoSubmit => {}
            }
        }

        notices
    }

    /// Live counts and countdown.
    pub fn snapshot(&self, now: DateTime<Utc>) -> ProctorSnapshot {
        ProctorSnapshot {
            attempt_id: self.attempt_id,
            platform: self.platform(),
            phase: self.escalation.phase(),
            warnings: self.escalation.warnings(),
            violations: self.escalation.violation_count(),
            max_violations: self.escalation.max_violations(),
            countdown_remaining: self.escalation.countdown_remaining(now),
            records: self.escalation.records().to_vec(),
        }
    }

    /// Cancel a running escalation countdown on normal submission.
    pub fn cancel_countdown(&mut self) -> bool {
        self.scheduler.cancel(TaskPurpose::EscalationCountdown);
        self.escalation.cancel()
    }

    /// Unmount the detectors, restore patched capabilities and drop every
    /// timer. The engine cannot be re-armed.
    pub fn teardown(&mut self) {
        if self.lifecycle == Lifecycle::TornDown {
            return;
        }
        self.detectors.teardown(&self.env);
        self.scheduler.cancel_all();
        self.lifecycle = Lifecycle::TornDown;
        info!(attempt_id = %self.attempt_id, "Proctoring torn down");
    }

    fn ingest_all(&mut self, signals: Vec<ViolationSignal>, now: DateTime<Utc>) -> Vec<ProctorNotice> {
        let mut notices = Vec::new();
        for signal in signals {
            self.ingest(signal, now, &mut notices);
        }
        notices
    }

    fn ingest(&mut self, signal: ViolationSignal, now: DateTime<Utc>, notices: &mut Vec<ProctorNotice>) {
        if self.escalation.is_disabled() {
            debug!(signal = signal.kind.log_type(), "Signal dropped, attempt disabled");
            return;
        }

        match self.aggregator.ingest(&signal) {
            AggregateOutcome::Ignored { reason } => {
                debug!(signal = signal.kind.log_type(), reason = ?reason, "Signal not counted");
            }
            AggregateOutcome::Warning { warnings } => {
                self.escalation.observe_warnings(warnings);
                info!(attempt_id = %self.attempt_id, warnings, "Integrity warning");
                notices.push(ProctorNotice::Warning { warnings });
            }
            AggregateOutcome::Violation { record } => {
                self.escalation.observe_warnings(self.aggregator.warnings());
                let step = self.escalation.record(record.clone(), now);
                let count = match step {
                    EscalationStep::Ignored => return,
                    EscalationStep::Recorded { count } | EscalationStep::Disabled { count, .. } => count,
                };
                info!(
                    attempt_id = %self.attempt_id,
                    category = %record.category,
                    count,
                    "Violation recorded"
                );
                notices.push(ProctorNotice::Violation { record, count });
                notices.push(ProctorNotice::ViolationLog(ViolationLogEntry::from_signal(
                    &signal,
                    self.attempt_id,
                    self.page.user_agent.clone(),
                    self.page.url.clone(),
                )));

                if let EscalationStep::Disabled { deadline, .. } = step {
                    self.scheduler.schedule(TaskPurpose::EscalationCountdown, deadline);
                    self.scheduler.cancel(TaskPurpose::AutomationScan);
                    notices.push(ProctorNotice::Disabled {
                        count,
                        countdown: self.config.escalation.countdown,
                    });
                }
            }
        }
    }
}

impl std::fmt::Debug for ProctorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProctorEngine")
            .field("attempt_id", &self.attempt_id)
            .field("platform", &self.platform())
            .field("phase", &self.escalation.phase())
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}
