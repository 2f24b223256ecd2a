//! Keyboard-shortcut detector.
//!
//! Matches OS-specific screenshot, devtools, view-source and save-page
//! combinations. A match raises the signal and suppresses the browser's
//! default action in the same step.

use chrono::{DateTime, Utc};
use tracing::debug;
use vigil_types::{OsFamily, Platform, SignalKind, ViolationSignal};

use crate::detector::{Detection, Detector, DetectorEnv, DetectorKind};
use crate::event::{KeyStroke, PageEvent};

const DEVTOOLS_LETTERS: [char; 3] = ['i', 'j', 'c'];
const MAC_SCREENSHOT_DIGITS: [u32; 4] = [3, 4, 5, 6];

/// Intercepts forbidden keyboard shortcuts.
#[derive(Debug)]
pub struct KeyboardDetector {
    platform: Platform,
    os: OsFamily,
    mounted: bool,
}

impl KeyboardDetector {
    pub fn new(platform: Platform, os: OsFamily) -> Self {
        Self {
            platform,
            os,
            mounted: false,
        }
    }

    /// Classify a stroke without side effects.
    pub fn classify(&self, stroke: &KeyStroke) -> Option<SignalKind> {
        if let Some(combo) = self.screenshot_combo(stroke) {
            return Some(SignalKind::ScreenshotShortcut { combo });
        }
        if let Some(combo) = self.devtools_combo(stroke) {
            return Some(SignalKind::DevtoolsShortcut { combo });
        }
        let letter = stroke.letter();
        if letter == Some('u') && self.is_view_source_chord(stroke) {
            return Some(SignalKind::ViewSource);
        }
        if letter == Some('s') && self.primary_modifier(stroke) && !stroke.alt {
            return Some(SignalKind::SavePage);
        }
        None
    }

    fn screenshot_combo(&self, stroke: &KeyStroke) -> Option<String> {
        if stroke.key == "PrintScreen" || stroke.code == "PrintScreen" {
            return Some(combo_label(stroke, "PrintScreen"));
        }

        let windows_like = matches!(self.os, OsFamily::Windows | OsFamily::Unknown);
        if windows_like && stroke.meta && stroke.shift && stroke.letter() == Some('s') {
            return Some("Win+Shift+S".to_string());
        }

        let mac_like = matches!(self.os, OsFamily::MacOs | OsFamily::Unknown);
        if mac_like && stroke.meta && stroke.shift {
            if let Some(digit) = stroke.digit().filter(|d| MAC_SCREENSHOT_DIGITS.contains(d)) {
                return Some(format!("Cmd+Shift+{}", digit));
            }
        }

        None
    }

    fn devtools_combo(&self, stroke: &KeyStroke) -> Option<String> {
        if stroke.key == "F12" || stroke.code == "F12" {
            return Some("F12".to_string());
        }
        let letter = stroke.letter().filter(|c| DEVTOOLS_LETTERS.contains(c))?;
        let upper = letter.to_ascii_uppercase();
        if self.os.uses_command_key() {
            (stroke.meta && stroke.alt).then(|| format!("Cmd+Alt+{}", upper))
        } else {
            (stroke.ctrl && stroke.shift).then(|| format!("Ctrl+Shift+{}", upper))
        }
    }

    fn is_view_source_chord(&self, stroke: &KeyStroke) -> bool {
        if self.os.uses_command_key() {
            stroke.meta && stroke.alt
        } else {
            stroke.ctrl && !stroke.shift
        }
    }

    fn primary_modifier(&self, stroke: &KeyStroke) -> bool {
        if self.os.uses_command_key() {
            stroke.meta
        } else {
            stroke.ctrl
        }
    }
}

fn combo_label(stroke: &KeyStroke, key: &str) -> String {
    let mut parts = Vec::new();
    if stroke.ctrl {
        parts.push("Ctrl");
    }
    if stroke.alt {
        parts.push("Alt");
    }
    if stroke.shift {
        parts.push("Shift");
    }
    if stroke.meta {
        parts.push("Meta");
    }
    parts.push(key);
    parts.join("+")
}

impl Detector for KeyboardDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Keyboard
    }

    fn mount(&mut self, _env: &DetectorEnv, _now: DateTime<Utc>) -> Vec<ViolationSignal> {
        self.mounted = true;
        Vec::new()
    }

    fn handle(&mut self, event: &PageEvent, now: DateTime<Utc>) -> Detection {
        let PageEvent::KeyDown(stroke) = event else {
            return Detection::none();
        };
        if !self.mounted {
            return Detection::none();
        }
        match self.classify(stroke) {
            Some(kind) => {
                debug!(os = ?self.os, signal = kind.log_type(), "Blocked shortcut");
                Detection::blocked(
                    ViolationSignal::new(kind, now, self.platform)
                        .with_detail(combo_label(stroke, &stroke.key)),
                )
            }
            None => Detection::none(),
        }
    }

    fn teardown(&mut self, _env: &DetectorEnv) {
        self.mounted = false;
    }
}
