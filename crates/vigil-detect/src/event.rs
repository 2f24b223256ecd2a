//! Page events delivered to detectors.
//!
//! These mirror the DOM events a browser host forwards: visibility and focus
//! changes, key presses and context-menu requests.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A page event forwarded by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageEvent {
    /// `visibilitychange` with the resulting hidden state.
    VisibilityChanged { hidden: bool },

    /// Window lost focus.
    WindowBlur,

    /// Window regained focus.
    WindowFocus,

    /// `keydown`.
    KeyDown(KeyStroke),

    /// `contextmenu` on an element.
    ContextMenu { target: ContextTarget },
}

/// A key press with its modifier state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStroke {
    /// Logical key value (`"s"`, `"PrintScreen"`, `"F12"`).
    pub key: String,

    /// Physical key code (`"KeyS"`, `"Digit4"`), empty if unknown.
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    /// Cmd on Apple keyboards, Win on Windows keyboards.
    #[serde(default)]
    pub meta: bool,
}

impl KeyStroke {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    /// Lower-case letter for this stroke, preferring the physical code since
    /// Alt/Option rewrites the logical key on Apple keyboards.
    pub fn letter(&self) -> Option<char> {
        if let Some(rest) = self.code.strip_prefix("Key") {
            return single_char(rest).map(|c| c.to_ascii_lowercase());
        }
        single_char(&self.key)
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase())
    }

    /// Digit for this stroke, preferring the physical code since Shift
    /// rewrites the logical key.
    pub fn digit(&self) -> Option<u32> {
        if let Some(rest) = self.code.strip_prefix("Digit") {
            return single_char(rest).and_then(|c| c.to_digit(10));
        }
        single_char(&self.key).and_then(|c| c.to_digit(10))
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Element a context menu was requested on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextTarget {
    Image,
    Video,
    Canvas,
    Svg,
    Text,
    Link,
    Other,
}

impl ContextTarget {
    /// Media, canvas and vector graphics can be fed to an image search.
    pub fn is_media(&self) -> bool {
        matches!(
            self,
            ContextTarget::Image | ContextTarget::Video | ContextTarget::Canvas | ContextTarget::Svg
        )
    }
}

impl fmt::Display for ContextTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContextTarget::Image => "image",
            ContextTarget::Video => "video",
            ContextTarget::Canvas => "canvas",
            ContextTarget::Svg => "svg",
            ContextTarget::Text => "text",
            ContextTarget::Link => "link",
            ContextTarget::Other => "element",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_prefers_physical_code() {
        // Option+Cmd+I produces a dead key on macOS
        let stroke = KeyStroke::new("ˆ").code("KeyI").meta().alt();
        assert_eq!(stroke.letter(), Some('i'));
        assert_eq!(KeyStroke::new("U").letter(), Some('u'));
        assert_eq!(KeyStroke::new("F12").letter(), None);
    }

    #[test]
    fn digit_prefers_physical_code() {
        let stroke = KeyStroke::new("$").code("Digit4").meta().shift();
        assert_eq!(stroke.digit(), Some(4));
        assert_eq!(KeyStroke::new("5").digit(), Some(5));
    }

    #[test]
    fn page_event_json_shape() {
        let event: PageEvent = serde_json::from_str(
            r#"{"type":"key_down","key":"s","code":"KeyS","ctrl":true}"#,
        )
        .unwrap();
        assert_eq!(event, PageEvent::KeyDown(KeyStroke::new("s").code("KeyS").ctrl()));

        let event: PageEvent =
            serde_json::from_str(r#"{"type":"context_menu","target":"canvas"}"#).unwrap();
        assert_eq!(
            event,
            PageEvent::ContextMenu {
                target: ContextTarget::Canvas
            }
        );
    }
}
