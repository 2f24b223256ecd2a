//! Automation/headless detector.
//!
//! Inspects an [`EnvironmentSnapshot`] at mount and on every scheduled scan.
//! Each distinct marker is reported once per mount.

use std::collections::HashSet;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vigil_types::{Platform, SignalKind, ViolationSignal};

use crate::config::DetectorConfig;
use crate::detector::{Detection, Detector, DetectorEnv, DetectorKind};
use crate::event::PageEvent;

/// Globals injected by common automation frameworks.
const KNOWN_AUTOMATION_GLOBALS: &[&str] = &[
    "__webdriver_evaluate",
    "__selenium_evaluate",
    "__webdriver_script_function",
    "__webdriver_unwrapped",
    "__selenium_unwrapped",
    "__driver_evaluate",
    "__driver_unwrapped",
    "__fxdriver_evaluate",
    "__fxdriver_unwrapped",
    "_Selenium_IDE_Recorder",
    "_selenium",
    "calledSelenium",
    "callPhantom",
    "_phantom",
    "__nightmare",
    "domAutomation",
    "domAutomationController",
    "__puppeteer_evaluation_script__",
    "__playwright_evaluation_script__",
    "__pwInitScripts",
];

/// ChromeDriver injects `cdc_<random>` globals.
const CHROMEDRIVER_PREFIX: &str = "cdc_";

/// User-agent fragments of headless or scripted browsers.
const SUSPICIOUS_USER_AGENT_MARKERS: &[&str] = &[
    "HeadlessChrome",
    "PhantomJS",
    "Puppeteer",
    "Playwright",
    "Selenium",
    "WebDriver",
    "SlimerJS",
];

/// What the page environment looks like right now.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    /// `navigator.webdriver`.
    #[serde(default)]
    pub webdriver: bool,

    /// `navigator.plugins.length`, `None` if the browser does not expose it.
    #[serde(default)]
    pub plugin_count: Option<usize>,

    /// Names of own properties on the global object.
    #[serde(default)]
    pub globals: Vec<String>,

    #[serde(default)]
    pub user_agent: String,
}

impl EnvironmentSnapshot {
    /// A typical, clean browser.
    pub fn browser(user_agent: impl Into<String>) -> Self {
        Self {
            webdriver: false,
            plugin_count: Some(5),
            globals: Vec::new(),
            user_agent: user_agent.into(),
        }
    }
}

/// Source of environment snapshots.
pub trait EnvironmentProbe: Send + Sync {
    fn snapshot(&self) -> EnvironmentSnapshot;
}

/// Probe returning a replaceable, fixed snapshot.
#[derive(Debug, Default)]
pub struct StaticEnvironment {
    snapshot: RwLock<EnvironmentSnapshot>,
}

impl StaticEnvironment {
    pub fn new(snapshot: EnvironmentSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    pub fn browser(user_agent: impl Into<String>) -> Self {
        Self::new(EnvironmentSnapshot::browser(user_agent))
    }

    /// Replace the snapshot, e.g. when a script is injected mid-attempt.
    pub fn set(&self, snapshot: EnvironmentSnapshot) {
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = snapshot;
    }
}

impl EnvironmentProbe for StaticEnvironment {
    fn snapshot(&self) -> EnvironmentSnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Flags automation markers in the environment.
#[derive(Debug)]
pub struct AutomationDetector {
    platform: Platform,
    check_plugins: bool,
    extra_globals: Vec<String>,
    extra_user_agent_markers: Vec<String>,
    reported: HashSet<String>,
    mounted: bool,
}

impl AutomationDetector {
    pub fn new(platform: Platform, config: &DetectorConfig) -> Self {
        Self {
            platform,
            // Mobile browsers legitimately expose no plugins
            check_plugins: !platform.is_mobile(),
            extra_globals: config.extra_automation_globals.clone(),
            extra_user_agent_markers: config.extra_user_agent_markers.clone(),
            reported: HashSet::new(),
            mounted: false,
        }
    }

    /// Every marker present in a snapshot, in a stable order.
    pub fn markers(&self, snapshot: &EnvironmentSnapshot) -> Vec<String> {
        let mut markers = Vec::new();

        if snapshot.webdriver {
            markers.push("navigator.webdriver".to_string());
        }

        if self.check_plugins && snapshot.plugin_count == Some(0) {
            markers.push("navigator.plugins:empty".to_string());
        }

        for global in &snapshot.globals {
            let known = KNOWN_AUTOMATION_GLOBALS.contains(&global.as_str())
                || global.starts_with(CHROMEDRIVER_PREFIX)
                || self.extra_globals.iter().any(|g| g == global);
            if known {
                markers.push(format!("global:{}", global));
            }
        }

        let ua = snapshot.user_agent.to_ascii_lowercase();
        let user_agent_markers = SUSPICIOUS_USER_AGENT_MARKERS
            .iter()
            .map(|m| m.to_string())
            .chain(self.extra_user_agent_markers.iter().cloned());
        for marker in user_agent_markers {
            if ua.contains(&marker.to_ascii_lowercase()) {
                markers.push(format!("user_agent:{}", marker));
            }
        }

        markers
    }

    fn inspect(&mut self, env: &DetectorEnv, now: DateTime<Utc>) -> Vec<ViolationSignal> {
        let snapshot = env.probe.snapshot();
        let fresh: Vec<String> = self
            .markers(&snapshot)
            .into_iter()
            .filter(|m| self.reported.insert(m.clone()))
            .collect();

        if fresh.is_empty() {
            return Vec::new();
        }
        warn!(platform = %self.platform, markers = ?fresh, "Automation markers detected");

        // One check is one signal, however many markers it tripped.
        let marker = fresh.join(", ");
        let detail = format!("markers=[{}] user_agent={}", marker, snapshot.user_agent);
        vec![
            ViolationSignal::new(SignalKind::AutomationMarker { marker }, now, self.platform)
                .with_detail(detail),
        ]
    }
}

impl Detector for AutomationDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Automation
    }

    fn mount(&mut self, env: &DetectorEnv, now: DateTime<Utc>) -> Vec<ViolationSignal> {
        self.mounted = true;
        self.reported.clear();
        info!(platform = %self.platform, "Automation detector mounted");
        self.inspect(env, now)
    }

    fn handle(&mut self, _event: &PageEvent, _now: DateTime<Utc>) -> Detection {
        Detection::none()
    }

    fn scan(&mut self, env: &DetectorEnv, now: DateTime<Utc>) -> Vec<ViolationSignal> {
        if !self.mounted {
            return Vec::new();
        }
        self.inspect(env, now)
    }

    fn teardown(&mut self, _env: &DetectorEnv) {
        self.mounted = false;
        self.reported.clear();
    }
}
