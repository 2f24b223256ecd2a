//! Detector configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables shared by the detector set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Interval between automation/headless scans after the mount-time scan.
    pub automation_scan_interval: Duration,

    /// Additional global names treated as automation markers.
    pub extra_automation_globals: Vec<String>,

    /// Additional user-agent substrings treated as automation markers.
    pub extra_user_agent_markers: Vec<String>,

    /// Suppress the default context menu for every right-click, not only media.
    pub suppress_all_context_menus: bool,

    /// Enable the keyboard-shortcut detector.
    pub enable_keyboard: bool,

    /// Enable the capability-tamper detector (desktop profiles only).
    pub enable_capability_tamper: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            automation_scan_interval: Duration::from_secs(5),
            extra_automation_globals: Vec::new(),
            extra_user_agent_markers: Vec::new(),
            suppress_all_context_menus: true,
            enable_keyboard: true,
            enable_capability_tamper: true,
        }
    }
}
