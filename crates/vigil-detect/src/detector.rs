//! Detector trait and shared environment.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_types::{Clock, ViolationSignal};

use crate::automation::EnvironmentProbe;
use crate::capability::CapabilityTable;
use crate::event::PageEvent;

/// Kind of detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Visibility,
    Keyboard,
    ContextMenu,
    Automation,
    CapabilityTamper,
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetectorKind::Visibility => "visibility",
            DetectorKind::Keyboard => "keyboard",
            DetectorKind::ContextMenu => "context_menu",
            DetectorKind::Automation => "automation",
            DetectorKind::CapabilityTamper => "capability_tamper",
        };
        f.write_str(name)
    }
}

/// What the host environment exposes to detectors.
#[derive(Clone)]
pub struct DetectorEnv {
    /// Patchable page capabilities.
    pub capabilities: Arc<CapabilityTable>,

    /// Source of environment snapshots for automation checks.
    pub probe: Arc<dyn EnvironmentProbe>,

    /// Time source used to stamp asynchronously raised signals.
    pub clock: Arc<dyn Clock>,
}

impl DetectorEnv {
    pub fn new(
        capabilities: Arc<CapabilityTable>,
        probe: Arc<dyn EnvironmentProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            capabilities,
            probe,
            clock,
        }
    }
}

impl fmt::Debug for DetectorEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorEnv")
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Result of handing one page event to a detector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detection {
    /// Signals raised by the event.
    pub signals: Vec<ViolationSignal>,

    /// Whether the browser's default action must be prevented.
    pub suppress_default: bool,
}

impl Detection {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn signal(signal: ViolationSignal) -> Self {
        Self {
            signals: vec![signal],
            suppress_default: false,
        }
    }

    /// Raise a signal and block the default action in the same step.
    pub fn blocked(signal: ViolationSignal) -> Self {
        Self {
            signals: vec![signal],
            suppress_default: true,
        }
    }

    pub fn suppress_only() -> Self {
        Self {
            signals: Vec::new(),
            suppress_default: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty() && !self.suppress_default
    }

    /// Fold another detector's result into this one.
    pub fn merge(&mut self, other: Detection) {
        self.signals.extend(other.signals);
        self.suppress_default |= other.suppress_default;
    }
}

/// An independent signal source.
///
/// Implementations must not panic, block, or leave side effects behind after
/// [`Detector::teardown`].
pub trait Detector: Send {
    fn kind(&self) -> DetectorKind;

    /// Install hooks and run any mount-time checks.
    fn mount(&mut self, _env: &DetectorEnv, _now: DateTime<Utc>) -> Vec<ViolationSignal> {
        Vec::new()
    }

    /// React to a page event.
    fn handle(&mut self, _event: &PageEvent, _now: DateTime<Utc>) -> Detection {
        Detection::none()
    }

    /// Cheap per-tick collection of asynchronously raised signals.
    fn poll(&mut self, _now: DateTime<Utc>) -> Vec<ViolationSignal> {
        Vec::new()
    }

    /// Periodic environment inspection, driven by the owner's scheduler.
    fn scan(&mut self, _env: &DetectorEnv, _now: DateTime<Utc>) -> Vec<ViolationSignal> {
        Vec::new()
    }

    /// Undo everything `mount` did.
    fn teardown(&mut self, _env: &DetectorEnv) {}
}
