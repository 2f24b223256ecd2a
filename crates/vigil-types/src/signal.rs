//! Raw signals emitted by detectors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::record::ViolationCategory;

/// What a detector observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalKind {
    /// Page became hidden.
    TabHidden,

    /// Window lost focus.
    WindowBlur,

    /// OS screenshot combination pressed.
    ScreenshotShortcut { combo: String },

    /// Developer tools combination pressed.
    DevtoolsShortcut { combo: String },

    /// View-source combination pressed.
    ViewSource,

    /// Save-page combination pressed.
    SavePage,

    /// Context menu opened on media, likely to search the image.
    ReverseImageSearch { target: String },

    /// Automation or headless marker present in the environment.
    AutomationMarker { marker: String },

    /// Canvas contents were exported.
    CanvasExport,

    /// Something wrote to the clipboard.
    ClipboardWrite,
}

impl SignalKind {
    /// Category this signal is filed under.
    pub fn category(&self) -> ViolationCategory {
        match self {
            SignalKind::TabHidden | SignalKind::WindowBlur => ViolationCategory::TabSwitch,
            SignalKind::ScreenshotShortcut { .. }
            | SignalKind::CanvasExport
            | SignalKind::ClipboardWrite => ViolationCategory::Screenshot,
            SignalKind::AutomationMarker { .. } | SignalKind::ReverseImageSearch { .. } => {
                ViolationCategory::Automation
            }
            SignalKind::DevtoolsShortcut { .. } | SignalKind::ViewSource | SignalKind::SavePage => {
                ViolationCategory::Other
            }
        }
    }

    /// Human-readable reason used for the violation record.
    pub fn describe(&self) -> String {
        match self {
            SignalKind::TabHidden => "Left the quiz tab".to_string(),
            SignalKind::WindowBlur => "Quiz window lost focus".to_string(),
            SignalKind::ScreenshotShortcut { combo } => {
                format!("Screenshot shortcut pressed ({})", combo)
            }
            SignalKind::DevtoolsShortcut { combo } => {
                format!("Developer tools shortcut pressed ({})", combo)
            }
            SignalKind::ViewSource => "Attempted to view page source".to_string(),
            SignalKind::SavePage => "Attempted to save the page".to_string(),
            SignalKind::ReverseImageSearch { target } => {
                format!("Context menu opened on {} (possible reverse image search)", target)
            }
            SignalKind::AutomationMarker { marker } => {
                format!("Automation tooling detected ({})", marker)
            }
            SignalKind::CanvasExport => "Canvas contents exported".to_string(),
            SignalKind::ClipboardWrite => "Clipboard write intercepted".to_string(),
        }
    }

    /// Short type tag used in outbound violation logs.
    pub fn log_type(&self) -> &'static str {
        match self {
            SignalKind::TabHidden => "tab_hidden",
            SignalKind::WindowBlur => "window_blur",
            SignalKind::ScreenshotShortcut { .. } => "screenshot_shortcut",
            SignalKind::DevtoolsShortcut { .. } => "devtools_shortcut",
            SignalKind::ViewSource => "view_source",
            SignalKind::SavePage => "save_page",
            SignalKind::ReverseImageSearch { .. } => "reverse_image_search",
            SignalKind::AutomationMarker { .. } => "automation_marker",
            SignalKind::CanvasExport => "canvas_export",
            SignalKind::ClipboardWrite => "clipboard_write",
        }
    }
}

/// Ephemeral observation handed straight to the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationSignal {
    pub kind: SignalKind,
    pub timestamp: DateTime<Utc>,
    pub platform: Platform,
    pub raw_detail: Option<String>,
}

impl ViolationSignal {
    pub fn new(kind: SignalKind, timestamp: DateTime<Utc>, platform: Platform) -> Self {
        Self {
            kind,
            timestamp,
            platform,
            raw_detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.raw_detail = Some(detail.into());
        self
    }

    pub fn category(&self) -> ViolationCategory {
        self.kind.category()
    }
}
