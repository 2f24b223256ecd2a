//! Visibility/focus detector.
//!
//! A single departure usually fires both `blur` and `visibilitychange`. The
//! detector tracks presence and reports only the present → away transition,
//! so one departure is one signal.

use chrono::{DateTime, Utc};
use tracing::debug;
use vigil_types::{Platform, SignalKind, ViolationSignal};

use crate::detector::{Detection, Detector, DetectorEnv, DetectorKind};
use crate::event::PageEvent;

/// Emits `tab_switch` signals on hidden/blur transitions.
#[derive(Debug)]
pub struct VisibilityDetector {
    platform: Platform,
    away: bool,
    mounted: bool,
}

impl VisibilityDetector {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            away: false,
            mounted: false,
        }
    }

    /// Whether the student is currently away from the page.
    pub fn is_away(&self) -> bool {
        self.away
    }

    fn depart(&mut self, kind: SignalKind, now: DateTime<Utc>) -> Detection {
        if self.away {
            return Detection::none();
        }
        self.away = true;
        debug!(platform = %self.platform, signal = kind.log_type(), "Page left");
        Detection::signal(ViolationSignal::new(kind, now, self.platform))
    }
}

impl Detector for VisibilityDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Visibility
    }

    fn mount(&mut self, _env: &DetectorEnv, _now: DateTime<Utc>) -> Vec<ViolationSignal> {
        self.mounted = true;
        self.away = false;
        Vec::new()
    }

    fn handle(&mut self, event: &PageEvent, now: DateTime<Utc>) -> Detection {
        if !self.mounted {
            return Detection::none();
        }
        match event {
            PageEvent::VisibilityChanged { hidden: true } => self.depart(SignalKind::TabHidden, now),
            PageEvent::WindowBlur => self.depart(SignalKind::WindowBlur, now),
            PageEvent::VisibilityChanged { hidden: false } | PageEvent::WindowFocus => {
                self.away = false;
                Detection::none()
            }
            _ => Detection::none(),
        }
    }

    fn teardown(&mut self, _env: &DetectorEnv) {
        self.mounted = false;
        self.away = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_env;

    #[test]
    fn blur_then_hidden_is_one_departure() {
        let env = test_env();
        let mut detector = VisibilityDetector::new(Platform::Desktop);
        let now = Utc::now();
        detector.mount(&env, now);

        let first = detector.handle(&PageEvent::WindowBlur, now);
        let second = detector.handle(&PageEvent::VisibilityChanged { hidden: true }, now);

        assert_eq!(first.signals.len(), 1);
        assert_eq!(first.signals[0].kind, SignalKind::WindowBlur);
        assert!(second.signals.is_empty());
        assert!(detector.is_away());
    }

    #[test]
    fn return_rearms_detection() {
        let env = test_env();
        let mut detector = VisibilityDetector::new(Platform::Mobile);
        let now = Utc::now();
        detector.mount(&env, now);

        detector.handle(&PageEvent::VisibilityChanged { hidden: true }, now);
        detector.handle(&PageEvent::VisibilityChanged { hidden: false }, now);
        let again = detector.handle(&PageEvent::VisibilityChanged { hidden: true }, now);

        assert_eq!(again.signals.len(), 1);
        assert_eq!(again.signals[0].platform, Platform::Mobile);
        assert!(!again.suppress_default);
    }

    #[test]
    fn unmounted_detector_is_silent() {
        let env = test_env();
        let mut detector = VisibilityDetector::new(Platform::Desktop);
        assert!(detector.handle(&PageEvent::WindowBlur, Utc::now()).is_empty());

        detector.mount(&env, Utc::now());
        detector.teardown(&env);
        assert!(detector.handle(&PageEvent::WindowBlur, Utc::now()).is_empty());
    }
}
