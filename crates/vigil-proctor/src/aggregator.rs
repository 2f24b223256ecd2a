//! Violation aggregator.
//!
//! Turns raw signals into counted violations under a per-platform policy:
//! - Desktop: outside the grace window, one signal is one violation
//! - Mobile: tab switches are debounced, the first changes of a run are
//!   free, later changes become warnings, and a full set of warnings
//!   collapses into one violation. Every other category is counted directly.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vigil_types::{
    elapsed_between, Platform, ViolationCategory, ViolationRecord, ViolationSignal,
};

use crate::config::{MobilePolicy, ProctorConfig, WarningDecay};

/// Why a signal was not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Monitoring has not been armed.
    NotArmed,
    /// Inside the initial grace window.
    GracePeriod,
    /// A repeat within the debounce interval of the last counted change.
    Debounced,
    /// One of the free changes at the start of a run.
    FreeChange { change: u32 },
}

/// Result of ingesting one signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateOutcome {
    Ignored { reason: IgnoreReason },
    /// A mobile tab switch added a warning.
    Warning { warnings: u32 },
    /// A violation was counted.
    Violation { record: ViolationRecord },
}

impl AggregateOutcome {
    pub fn is_violation(&self) -> bool {
        matches!(self, AggregateOutcome::Violation { .. })
    }
}

#[derive(Debug, Clone, Default)]
struct MobileRun {
    changes: u32,
    last_counted: Option<DateTime<Utc>>,
    last_signal: Option<DateTime<Utc>>,
    last_warning: Option<DateTime<Utc>>,
}

/// Per-attempt aggregation state.
#[derive(Debug, Clone)]
pub struct ViolationAggregator {
    platform: Platform,
    grace_period: Duration,
    grace_exempt: Vec<ViolationCategory>,
    mobile: MobilePolicy,
    armed_at: Option<DateTime<Utc>>,
    run: MobileRun,
    warnings: u32,
    violations: u32,
}

impl ViolationAggregator {
    pub fn new(platform: Platform, config: &ProctorConfig) -> Self {
        Self {
            platform,
            grace_period: config.grace_period(platform),
            grace_exempt: config.grace_exempt(platform).to_vec(),
            mobile: config.mobile.clone(),
            armed_at: None,
            run: MobileRun::default(),
            warnings: 0,
            violations: 0,
        }
    }

    /// Start monitoring; the grace window runs from `now`.
    pub fn arm(&mut self, now: DateTime<Utc>) {
        self.armed_at = Some(now);
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Live warning count.
    pub fn warnings(&self) -> u32 {
        self.warnings
    }

    /// Violations counted so far.
    pub fn violations(&self) -> u32 {
        self.violations
    }

    /// Whether `now` falls inside the grace window.
    pub fn in_grace(&self, now: DateTime<Utc>) -> bool {
        self.armed_at
            .map(|armed| elapsed_between(armed, now) < self.grace_period)
            .unwrap_or(false)
    }

    fn grace_exempt(&self, category: ViolationCategory) -> bool {
        self.grace_exempt.contains(&category)
    }

    /// Ingest a signal, using its own timestamp as the current time.
    ///
    /// Queued signals keep the time they were raised, so the grace window
    /// and the mobile buffer judge them at emission rather than at drain.
    pub fn ingest(&mut self, signal: &ViolationSignal) -> AggregateOutcome {
        let now = signal.timestamp;
        let category = signal.category();

        if !self.is_armed() {
            return AggregateOutcome::Ignored {
                reason: IgnoreReason::NotArmed,
            };
        }
        if self.in_grace(now) && !self.grace_exempt(category) {
            debug!(category = %category, "Signal inside grace window");
            return AggregateOutcome::Ignored {
                reason: IgnoreReason::GracePeriod,
            };
        }

        match (self.platform, category) {
            (Platform::Mobile, ViolationCategory::TabSwitch) => self.ingest_mobile_tab_switch(now),
            _ => self.count(ViolationRecord::from_signal(signal)),
        }
    }

    fn count(&mut self, record: ViolationRecord) -> AggregateOutcome {
        self.violations += 1;
        AggregateOutcome::Violation { record }
    }

    fn ingest_mobile_tab_switch(&mut self, now: DateTime<Utc>) -> AggregateOutcome {
        let policy = &self.mobile;

        if let Some(last) = self.run.last_signal {
            if elapsed_between(last, now) >= policy.run_reset {
                debug!(changes = self.run.changes, "Tab switch run reset");
                self.run.changes = 0;
                self.run.last_counted = None;
                if policy.warning_decay == WarningDecay::WithRunReset {
                    self.warnings = 0;
                }
            }
        }
        self.run.last_signal = Some(now);

        if let Some(last) = self.run.last_counted {
            if elapsed_between(last, now) < policy.debounce {
                return AggregateOutcome::Ignored {
                    reason: IgnoreReason::Debounced,
                };
            }
        }
        self.run.last_counted = Some(now);
        self.run.changes += 1;

        if self.run.changes <= policy.free_changes {
            return AggregateOutcome::Ignored {
                reason: IgnoreReason::FreeChange {
                    change: self.run.changes,
                },
            };
        }

        if let (WarningDecay::After(quiet), Some(last)) = (policy.warning_decay, self.run.last_warning) {
            if elapsed_between(last, now) >= quiet {
                self.warnings = 0;
            }
        }
        self.warnings += 1;
        self.run.last_warning = Some(now);

        if self.warnings >= policy.warnings_per_violation {
            let collapsed = self.warnings;
            self.warnings = 0;
            debug!(collapsed, "Warnings collapsed into a violation");
            return self.count(ViolationRecord::new(
                ViolationCategory::TabSwitch,
                format!("Left the quiz repeatedly ({} warnings)", collapsed),
                now,
            ));
        }

        AggregateOutcome::Warning {
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_types::SignalKind;

    fn at(start: DateTime<Utc>, millis: i64) -> DateTime<Utc> {
        start + chrono::Duration::milliseconds(millis)
    }

    fn hidden(ts: DateTime<Utc>, platform: Platform) -> ViolationSignal {
        ViolationSignal::new(SignalKind::TabHidden, ts, platform)
    }

    fn armed(platform: Platform, config: &ProctorConfig) -> (ViolationAggregator, DateTime<Utc>) {
        let start = Utc::now();
        let mut aggregator = ViolationAggregator::new(platform, config);
        aggregator.arm(start);
        (aggregator, start)
    }

    #[test]
    fn unarmed_signals_are_ignored() {
        let mut aggregator = ViolationAggregator::new(Platform::Desktop, &ProctorConfig::default());
        let outcome = aggregator.ingest(&hidden(Utc::now(), Platform::Desktop));
        assert_eq!(
            outcome,
            AggregateOutcome::Ignored {
                reason: IgnoreReason::NotArmed
            }
        );
    }

    #[test]
    fn desktop_one_signal_one_violation_after_grace() {
        let (mut aggregator, start) = armed(Platform::Desktop, &ProctorConfig::default());

        let early = aggregator.ingest(&hidden(at(start, 1_000), Platform::Desktop));
        assert_eq!(
            early,
            AggregateOutcome::Ignored {
                reason: IgnoreReason::GracePeriod
            }
        );

        for i in 0..3 {
            let outcome = aggregator.ingest(&hidden(at(start, 3_000 + i * 100), Platform::Desktop));
            assert!(outcome.is_violation());
        }
        assert_eq!(aggregator.violations(), 3);
        assert_eq!(aggregator.warnings(), 0);
    }

    #[test]
    fn automation_counts_inside_grace() {
        let (mut aggregator, start) = armed(Platform::Desktop, &ProctorConfig::default());
        let signal = ViolationSignal::new(
            SignalKind::AutomationMarker {
                marker: "navigator.webdriver".into(),
            },
            start,
            Platform::Desktop,
        );
        assert!(aggregator.ingest(&signal).is_violation());
    }

    #[test]
    fn grace_rules_come_from_config_accessors() {
        let mut config = ProctorConfig::default();
        config.mobile.grace_period = Duration::from_secs(10);
        config.mobile.grace_exempt = Vec::new();
        config.desktop.grace_period = Duration::from_secs(1);

        let (mut mobile, start) = armed(Platform::Mobile, &config);
        assert!(mobile.in_grace(at(start, 5_000)));
        assert!(!mobile.in_grace(at(start, 10_000)));

        let automation = ViolationSignal::new(
            SignalKind::AutomationMarker {
                marker: "navigator.webdriver".into(),
            },
            at(start, 1_000),
            Platform::Mobile,
        );
        assert!(config.grace_exempt(Platform::Mobile).is_empty());
        assert_eq!(
            mobile.ingest(&automation),
            AggregateOutcome::Ignored {
                reason: IgnoreReason::GracePeriod
            }
        );

        let (desktop, start) = armed(Platform::Desktop, &config);
        assert!(!desktop.in_grace(at(start, 2_000)));
    }

    #[test]
    fn mobile_burst_within_debounce_is_one_change() {
        let (mut aggregator, start) = armed(Platform::Mobile, &ProctorConfig::default());
        // Run through the two free changes first
        aggregator.ingest(&hidden(at(start, 4_000), Platform::Mobile));
        aggregator.ingest(&hidden(at(start, 8_000), Platform::Mobile));

        let outcomes: Vec<_> = (0..10)
            .map(|i| aggregator.ingest(&hidden(at(start, 12_000 + i * 250), Platform::Mobile)))
            .collect();
        let warnings = outcomes
            .iter()
            .filter(|o| matches!(o, AggregateOutcome::Warning { .. }))
            .count();
        assert_eq!(warnings, 1);
        assert_eq!(aggregator.warnings(), 1);
    }

    #[test]
    fn mobile_first_two_changes_are_free() {
        let (mut aggregator, start) = armed(Platform::Mobile, &ProctorConfig::default());
        assert_eq!(
            aggregator.ingest(&hidden(at(start, 4_000), Platform::Mobile)),
            AggregateOutcome::Ignored {
                reason: IgnoreReason::FreeChange { change: 1 }
            }
        );
        assert_eq!(
            aggregator.ingest(&hidden(at(start, 8_000), Platform::Mobile)),
            AggregateOutcome::Ignored {
                reason: IgnoreReason::FreeChange { change: 2 }
            }
        );
        assert_eq!(
            aggregator.ingest(&hidden(at(start, 12_000), Platform::Mobile)),
            AggregateOutcome::Warning { warnings: 1 }
        );
    }

    #[test]
    fn mobile_warnings_collapse_into_one_violation() {
        let (mut aggregator, start) = armed(Platform::Mobile, &ProctorConfig::default());
        let mut outcomes = Vec::new();
        // 2 free changes then 3 warnings, 4s apart so none are debounced
        for i in 1..=5 {
            outcomes.push(aggregator.ingest(&hidden(at(start, i * 4_000), Platform::Mobile)));
        }
        assert_eq!(outcomes[2], AggregateOutcome::Warning { warnings: 1 });
        assert_eq!(outcomes[3], AggregateOutcome::Warning { warnings: 2 });
        match &outcomes[4] {
            AggregateOutcome::Violation { record } => {
                assert_eq!(record.category, ViolationCategory::TabSwitch)
            }
            other => panic!("expected violation, got {:?}", other),
        }
        assert_eq!(aggregator.warnings(), 0);
        assert_eq!(aggregator.violations(), 1);
    }

    #[test]
    fn mobile_run_resets_after_quiet_period() {
        let (mut aggregator, start) = armed(Platform::Mobile, &ProctorConfig::default());
        for i in 1..=3 {
            aggregator.ingest(&hidden(at(start, i * 4_000), Platform::Mobile));
        }
        assert_eq!(aggregator.warnings(), 1);

        // 15s of quiet: the run restarts with two free changes, warnings kept
        let outcome = aggregator.ingest(&hidden(at(start, 12_000 + 15_000), Platform::Mobile));
        assert_eq!(
            outcome,
            AggregateOutcome::Ignored {
                reason: IgnoreReason::FreeChange { change: 1 }
            }
        );
        assert_eq!(aggregator.warnings(), 1);
    }

    #[test]
    fn warning_decay_with_run_reset() {
        let mut config = ProctorConfig::default();
        config.mobile.warning_decay = WarningDecay::WithRunReset;
        let (mut aggregator, start) = armed(Platform::Mobile, &config);
        for i in 1..=3 {
            aggregator.ingest(&hidden(at(start, i * 4_000), Platform::Mobile));
        }
        assert_eq!(aggregator.warnings(), 1);
        aggregator.ingest(&hidden(at(start, 30_000), Platform::Mobile));
        assert_eq!(aggregator.warnings(), 0);
    }

    #[test]
    fn warning_decay_after_quiet_period() {
        let mut config = ProctorConfig::default();
        config.mobile.warning_decay = WarningDecay::After(Duration::from_secs(6));
        let (mut aggregator, start) = armed(Platform::Mobile, &config);
        for i in 1..=3 {
            aggregator.ingest(&hidden(at(start, i * 4_000), Platform::Mobile));
        }
        // Next warning 8s after the last one: earlier warning forgotten
        assert_eq!(
            aggregator.ingest(&hidden(at(start, 20_000), Platform::Mobile)),
            AggregateOutcome::Warning { warnings: 1 }
        );
    }

    #[test]
    fn mobile_non_tab_signals_bypass_buffer() {
        let (mut aggregator, start) = armed(Platform::Mobile, &ProctorConfig::default());
        for kind in [
            SignalKind::ScreenshotShortcut {
                combo: "PrintScreen".into(),
            },
            SignalKind::DevtoolsShortcut { combo: "F12".into() },
        ] {
            let signal = ViolationSignal::new(kind, at(start, 5_000), Platform::Mobile);
            assert!(aggregator.ingest(&signal).is_violation());
        }
        assert_eq!(aggregator.warnings(), 0);
        assert_eq!(aggregator.violations(), 2);
    }
}
