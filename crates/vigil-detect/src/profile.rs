//! Per-platform detector profiles.

use serde::{Deserialize, Serialize};
use vigil_types::{OsFamily, Platform};

use crate::automation::AutomationDetector;
use crate::capability::CapabilityTamperDetector;
use crate::config::DetectorConfig;
use crate::context_menu::ContextMenuDetector;
use crate::keyboard::KeyboardDetector;
use crate::set::DetectorSet;
use crate::visibility::VisibilityDetector;

/// Which detectors run, and how, for a given environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum DetectorProfile {
    Desktop { os: OsFamily },
    Mobile { os: OsFamily },
}

impl DetectorProfile {
    pub fn from_user_agent(user_agent: &str) -> Self {
        let os = OsFamily::from_user_agent(user_agent);
        match Platform::from_user_agent(user_agent) {
            Platform::Desktop => DetectorProfile::Desktop { os },
            Platform::Mobile => DetectorProfile::Mobile { os },
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            DetectorProfile::Desktop { .. } => Platform::Desktop,
            DetectorProfile::Mobile { .. } => Platform::Mobile,
        }
    }

    pub fn os(&self) -> OsFamily {
        match self {
            DetectorProfile::Desktop { os } | DetectorProfile::Mobile { os } => *os,
        }
    }

    /// Build the detector set for this profile.
    ///
    /// Capability instrumentation is desktop only: mobile browsers expose
    /// canvas and clipboard through paths the page cannot patch reliably.
    pub fn build(&self, config: &DetectorConfig) -> DetectorSet {
        let platform = self.platform();
        let mut set = DetectorSet::new(platform, config.automation_scan_interval)
            .with(Box::new(VisibilityDetector::new(platform)));

        if config.enable_keyboard {
            set = set.with(Box::new(KeyboardDetector::new(platform, self.os())));
        }

        set = set
            .with(Box::new(ContextMenuDetector::new(
                platform,
                config.suppress_all_context_menus,
            )))
            .with(Box::new(AutomationDetector::new(platform, config)));

        if config.enable_capability_tamper && !platform.is_mobile() {
            set = set.with(Box::new(CapabilityTamperDetector::new(platform)));
        }

        set
    }
}
