//! # Vigil Detect - Untrusted-Environment Detectors
//!
//! Independent signal sources watching a quiz attempt. Each detector turns
//! page events or environment inspection into typed [`ViolationSignal`]s and
//! nothing else: counting and escalation live in `vigil-proctor`.
//!
//! ## Detectors
//!
//! - [`VisibilityDetector`]: hidden/blur transitions → `tab_switch`
//! - [`KeyboardDetector`]: screenshot, devtools, view-source and save-page
//!   shortcuts, suppressing the browser default in the same step
//! - [`ContextMenuDetector`]: right-click on media → reverse-image-search
//! - [`AutomationDetector`]: webdriver flag, empty plugin list, known
//!   automation globals and user-agent markers
//! - [`CapabilityTamperDetector`]: desktop only, instruments canvas export and
//!   clipboard write so every call is reported before delegating
//!
//! ## Contract
//!
//! Every detector entry point is infallible and non-blocking, and teardown
//! reverses every side effect (instrumented capabilities are restored to the
//! exact originals).
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vigil_detect::{
//!     CapabilityTable, DetectorConfig, DetectorEnv, DetectorProfile, PageEvent,
//!     StaticEnvironment,
//! };
//! use vigil_types::{Clock, SystemClock};
//!
//! let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0";
//! let profile = DetectorProfile::from_user_agent(ua);
//! let env = DetectorEnv::new(
//!     Arc::new(CapabilityTable::new()),
//!     Arc::new(StaticEnvironment::browser(ua)),
//!     Arc::new(SystemClock),
//! );
//!
//! let mut set = profile.build(&DetectorConfig::default());
//! let now = env.clock.now();
//! set.mount(&env, now);
//! let detection = set.handle(&PageEvent::VisibilityChanged { hidden: true }, now);
//! assert_eq!(detection.signals.len(), 1);
//! set.teardown(&env);
//! ```

#![deny(unsafe_code)]

pub mod automation;
pub mod capability;
pub mod config;
pub mod context_menu;
pub mod detector;
pub mod error;
pub mod event;
pub mod keyboard;
pub mod profile;
pub mod set;
pub mod visibility;

pub use automation::{AutomationDetector, EnvironmentProbe, EnvironmentSnapshot, StaticEnvironment};
pub use capability::{
    Capability, CapabilityKind, CapabilityTable, CapabilityTamperDetector, InstrumentedCapability,
    SignalQueue,
};
pub use config::DetectorConfig;
pub use context_menu::ContextMenuDetector;
pub use detector::{Detection, Detector, DetectorEnv, DetectorKind};
pub use error::{DetectError, DetectResult};
pub use event::{ContextTarget, KeyStroke, PageEvent};
pub use keyboard::KeyboardDetector;
pub use profile::DetectorProfile;
pub use set::DetectorSet;
pub use visibility::VisibilityDetector;

pub use vigil_types::ViolationSignal;
