//! Proctoring configuration.
//!
//! Defines the per-platform aggregation policies, warning decay and the
//! escalation threshold.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use vigil_detect::DetectorConfig;
use vigil_types::{Platform, ViolationCategory};

use crate::error::{ProctorError, ProctorResult};

/// Configuration for one proctored attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProctorConfig {
    /// Desktop aggregation policy.
    pub desktop: DesktopPolicy,

    /// Mobile aggregation policy.
    pub mobile: MobilePolicy,

    /// Escalation threshold and countdown.
    pub escalation: EscalationConfig,

    /// Detector tunables.
    pub detectors: DetectorConfig,
}

impl ProctorConfig {
    /// Check every tunable is usable.
    pub fn validate(&self) -> ProctorResult<()> {
        if self.escalation.max_violations == 0 {
            return Err(ProctorError::InvalidConfig(
                "escalation.max_violations must be at least 1".into(),
            ));
        }
        if self.mobile.warnings_per_violation == 0 {
            return Err(ProctorError::InvalidConfig(
                "mobile.warnings_per_violation must be at least 1".into(),
            ));
        }
        if self.mobile.run_reset <= self.mobile.debounce {
            return Err(ProctorError::InvalidConfig(
                "mobile.run_reset must be longer than mobile.debounce".into(),
            ));
        }
        if self.detectors.automation_scan_interval.is_zero() {
            return Err(ProctorError::InvalidConfig(
                "detectors.automation_scan_interval must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Grace window for a platform.
    pub fn grace_period(&self, platform: Platform) -> Duration {
        match platform {
            Platform::Desktop => self.desktop.grace_period,
            Platform::Mobile => self.mobile.grace_period,
        }
    }

    /// Categories counted even inside the grace window.
    pub fn grace_exempt(&self, platform: Platform) -> &[ViolationCategory] {
        match platform {
            Platform::Desktop => &self.desktop.grace_exempt,
            Platform::Mobile => &self.mobile.grace_exempt,
        }
    }
}

/// Desktop policy: one signal, one violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopPolicy {
    /// Signals in this window after arming are ignored.
    pub grace_period: Duration,

    /// Categories the grace window does not apply to.
    pub grace_exempt: Vec<ViolationCategory>,
}

impl Default for DesktopPolicy {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(3),
            grace_exempt: vec![ViolationCategory::Automation],
        }
    }
}

/// Mobile policy: tab switches go through a debounced warning buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MobilePolicy {
    pub grace_period: Duration,

    pub grace_exempt: Vec<ViolationCategory>,

    /// Tab switches within this interval of the last counted change are ignored.
    pub debounce: Duration,

    /// The change run resets after this long without a tab switch.
    pub run_reset: Duration,

    /// Changes at the start of a run that are not counted at all.
    pub free_changes: u32,

    /// Warnings that collapse into one violation.
    pub warnings_per_violation: u32,

    pub warning_decay: WarningDecay,
}

impl Default for MobilePolicy {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(3),
            grace_exempt: vec![ViolationCategory::Automation],
            debounce: Duration::from_secs(3),
            run_reset: Duration::from_secs(15),
            free_changes: 2,
            warnings_per_violation: 3,
            warning_decay: WarningDecay::Never,
        }
    }
}

/// When accumulated mobile warnings are forgotten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningDecay {
    /// Warnings only reset by collapsing into a violation.
    #[default]
    Never,

    /// Warnings also reset when the change run resets.
    WithRunReset,

    /// Warnings reset after this long without a new warning.
    After(Duration),
}

/// Escalation threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Violations that disable the attempt.
    pub max_violations: u32,

    /// Visible countdown between disabling and auto-submission.
    pub countdown: Duration,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            max_violations: 3,
            countdown: Duration::from_secs(3),
        }
    }
}
