//! Platform classification for proctoring policy
//!
//! Vigil distinguishes two platforms with very different signal fidelity:
//! - Desktop: visibility and keyboard signals are reliable, counted directly
//! - Mobile: visibility signals are noisy (OS keyboard, permission prompts,
//!   notification shades) and pass through a warning buffer first

use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform the attempt runs on, deciding the aggregation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Desktop or laptop browser
    #[default]
    Desktop,

    /// Phone or tablet browser
    Mobile,
}

impl Platform {
    /// Classify a user agent string.
    pub fn from_user_agent(user_agent: &str) -> Self {
        if OsFamily::from_user_agent(user_agent).is_mobile() || user_agent.contains("Mobi") {
            Platform::Mobile
        } else {
            Platform::Desktop
        }
    }

    pub fn is_mobile(&self) -> bool {
        matches!(self, Platform::Mobile)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Desktop => write!(f, "desktop"),
            Platform::Mobile => write!(f, "mobile"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "desktop" => Ok(Platform::Desktop),
            "mobile" => Ok(Platform::Mobile),
            other => Err(format!("unknown platform: {}", other)),
        }
    }
}

/// Operating system family, used to select OS-specific shortcut tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    Windows,
    MacOs,
    Linux,
    ChromeOs,
    Android,
    Ios,
    #[default]
    Unknown,
}

impl OsFamily {
    /// Sniff the OS family from a user agent string.
    ///
    /// Order matters: iOS agents advertise "like Mac OS X" and Android
    /// agents advertise "Linux".
    pub fn from_user_agent(user_agent: &str) -> Self {
        if user_agent.contains("Android") {
            OsFamily::Android
        } else if ["iPhone", "iPad", "iPod"]
            .iter()
            .any(|token| user_agent.contains(token))
        {
            OsFamily::Ios
        } else if user_agent.contains("Windows") {
            OsFamily::Windows
        } else if user_agent.contains("Macintosh") || user_agent.contains("Mac OS X") {
            OsFamily::MacOs
        } else if user_agent.contains("CrOS") {
            OsFamily::ChromeOs
        } else if user_agent.contains("Linux") || user_agent.contains("X11") {
            OsFamily::Linux
        } else {
            OsFamily::Unknown
        }
    }

    pub fn is_mobile(&self) -> bool {
        matches!(self, OsFamily::Android | OsFamily::Ios)
    }

    /// Apple platforms use Cmd where others use Ctrl.
    pub fn uses_command_key(&self) -> bool {
        matches!(self, OsFamily::MacOs | OsFamily::Ios)
    }
}
