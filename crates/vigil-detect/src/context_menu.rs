//! Context-menu detector.

use chrono::{DateTime, Utc};
use vigil_types::{Platform, SignalKind, ViolationSignal};

use crate::detector::{Detection, Detector, DetectorEnv, DetectorKind};
use crate::event::PageEvent;

/// Flags right-clicks on media as possible reverse-image searches.
#[derive(Debug)]
pub struct ContextMenuDetector {
    platform: Platform,
    suppress_all: bool,
    mounted: bool,
}

impl ContextMenuDetector {
    pub fn new(platform: Platform, suppress_all: bool) -> Self {
        Self {
            platform,
            suppress_all,
            mounted: false,
        }
    }
}

impl Detector for ContextMenuDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::ContextMenu
    }

    fn mount(&mut self, _env: &DetectorEnv, _now: DateTime<Utc>) -> Vec<ViolationSignal> {
        self.mounted = true;
        Vec::new()
    }

    fn handle(&mut self, event: &PageEvent, now: DateTime<Utc>) -> Detection {
        let PageEvent::ContextMenu { target } = event else {
            return Detection::none();
        };
        if !self.mounted {
            return Detection::none();
        }
        if target.is_media() {
            Detection::blocked(ViolationSignal::new(
                SignalKind::ReverseImageSearch {
                    target: target.to_string(),
                },
                now,
                self.platform,
            ))
        } else if self.suppress_all {
            Detection::suppress_only()
        } else {
            Detection::none()
        }
    }

    fn teardown(&mut self, _env: &DetectorEnv) {
        self.mounted = false;
    }
}
