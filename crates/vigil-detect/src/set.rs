//! Detector set: the mounted collection for one attempt.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use vigil_types::{Platform, ViolationSignal};

use crate::detector::{Detection, Detector, DetectorEnv, DetectorKind};
use crate::event::PageEvent;

/// Owns every detector for one attempt and fans events out to them.
pub struct DetectorSet {
    platform: Platform,
    detectors: Vec<Box<dyn Detector>>,
    scan_interval: Duration,
    mounted: bool,
}

impl DetectorSet {
    pub fn new(platform: Platform, scan_interval: Duration) -> Self {
        Self {
            platform,
            detectors: Vec::new(),
            scan_interval,
            mounted: false,
        }
    }

    /// Add a detector. Has no effect on an already mounted set.
    pub fn with(mut self, detector: Box<dyn Detector>) -> Self {
        if !self.mounted {
            self.detectors.push(detector);
        }
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Interval at which the owner should call [`DetectorSet::scan`].
    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn kinds(&self) -> Vec<DetectorKind> {
        self.detectors.iter().map(|d| d.kind()).collect()
    }

    /// Mount every detector. Mounting twice is a no-op.
    pub fn mount(&mut self, env: &DetectorEnv, now: DateTime<Utc>) -> Vec<ViolationSignal> {
        if self.mounted {
            return Vec::new();
        }
        self.mounted = true;
        let signals: Vec<ViolationSignal> = self
            .detectors
            .iter_mut()
            .flat_map(|d| d.mount(env, now))
            .collect();
        info!(
            platform = %self.platform,
            detectors = ?self.kinds(),
            initial_signals = signals.len(),
            "Detector set mounted"
        );
        signals
    }

    /// Hand a page event to every detector, merging their results.
    pub fn handle(&mut self, event: &PageEvent, now: DateTime<Utc>) -> Detection {
        let mut detection = Detection::none();
        if !self.mounted {
            return detection;
        }
        for detector in &mut self.detectors {
            detection.merge(detector.handle(event, now));
        }
        detection
    }

    /// Collect asynchronously raised signals.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Vec<ViolationSignal> {
        if !self.mounted {
            return Vec::new();
        }
        self.detectors
            .iter_mut()
            .flat_map(|d| d.poll(now))
            .collect()
    }

    /// Run periodic environment inspection.
    pub fn scan(&mut self, env: &DetectorEnv, now: DateTime<Utc>) -> Vec<ViolationSignal> {
        if !self.mounted {
            return Vec::new();
        }
        self.detectors
            .iter_mut()
            .flat_map(|d| d.scan(env, now))
            .collect()
    }

    /// Tear every detector down, in reverse mount order.
    pub fn teardown(&mut self, env: &DetectorEnv) {
        if !self.mounted {
            return;
        }
        for detector in self.detectors.iter_mut().rev() {
            detector.teardown(env);
        }
        self.mounted = false;
        debug!(platform = %self.platform, "Detector set torn down");
    }
}

impl std::fmt::Debug for DetectorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorSet")
            .field("platform", &self.platform)
            .field("detectors", &self.kinds())
            .field("mounted", &self.mounted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ContextTarget, KeyStroke};
    use crate::test_support::test_env;
    use crate::{ContextMenuDetector, KeyboardDetector, VisibilityDetector};
    use vigil_types::OsFamily;

    fn desktop_set() -> DetectorSet {
        DetectorSet::new(Platform::Desktop, Duration::from_secs(5))
            .with(Box::new(VisibilityDetector::new(Platform::Desktop)))
            .with(Box::new(KeyboardDetector::new(Platform::Desktop, OsFamily::Windows)))
            .with(Box::new(ContextMenuDetector::new(Platform::Desktop, true)))
    }

    #[test]
    fn events_fan_out_and_merge() {
        let env = test_env();
        let mut set = desktop_set();
        let now = Utc::now();
        set.mount(&env, now);

        let shot = set.handle(&PageEvent::KeyDown(KeyStroke::new("PrintScreen")), now);
        assert_eq!(shot.signals.len(), 1);
        assert!(shot.suppress_default);

        let text = set.handle(
            &PageEvent::ContextMenu {
                target: ContextTarget::Text,
            },
            now,
        );
        assert!(text.signals.is_empty());
        assert!(text.suppress_default);
    }

    #[test]
    fn unmounted_set_is_inert() {
        let env = test_env();
        let mut set = desktop_set();
        let now = Utc::now();
        assert!(set.handle(&PageEvent::WindowBlur, now).is_empty());

        set.mount(&env, now);
        set.teardown(&env);
        assert!(!set.is_mounted());
        assert!(set.handle(&PageEvent::WindowBlur, now).is_empty());
        assert!(set.poll(now).is_empty());
    }

    #[test]
    fn double_mount_is_noop() {
        let env = test_env();
        let mut set = desktop_set();
        let now = Utc::now();
        set.mount(&env, now);
        set.handle(&PageEvent::WindowBlur, now);
        set.mount(&env, now);
        // Still away: a second mount did not reset presence
        assert!(set.handle(&PageEvent::WindowBlur, now).signals.is_empty());
    }
}
