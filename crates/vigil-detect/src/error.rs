//! Error types for vigil-detect.
//!
//! Detectors themselves never fail; these errors belong to the instrumented
//! capabilities, which must report the same failures the originals would.

use thiserror::Error;

use crate::capability::CapabilityKind;

/// Errors raised when invoking a page capability.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectError {
    /// No implementation is installed for the capability.
    #[error("capability not available: {0}")]
    CapabilityUnavailable(CapabilityKind),

    /// The underlying implementation failed.
    #[error("capability {kind} failed: {reason}")]
    CapabilityFailed { kind: CapabilityKind, reason: String },
}

/// Result type for capability invocations.
pub type DetectResult<T> = Result<T, DetectError>;
