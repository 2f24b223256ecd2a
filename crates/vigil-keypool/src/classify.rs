//! Upstream error classification.
//!
//! Only capacity failures (rate limit, quota, overload) rotate to another
//! credential. Everything else is the caller's problem.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A failure reported by an AI upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamError {
    /// HTTP status, when the failure came from a response.
    pub status: Option<u16>,
    pub message: String,
}

impl UpstreamError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(Some(status), message)
    }

    /// Failure with no HTTP status (transport error, malformed payload).
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    pub fn class(&self) -> ErrorClass {
        classify(self)
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "status {}: {}", status, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for UpstreamError {}

/// Failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Upstream overloaded or temporarily unavailable.
    Overload,
    /// Rate limit or quota exhausted for this credential.
    Quota,
    /// Credential rejected.
    Auth,
    Unknown,
}

impl ErrorClass {
    /// Capacity errors rotate to another credential and retry.
    pub fn is_capacity(&self) -> bool {
        matches!(self, ErrorClass::Overload | ErrorClass::Quota)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Overload => write!(f, "overload"),
            ErrorClass::Quota => write!(f, "quota"),
            ErrorClass::Auth => write!(f, "auth"),
            ErrorClass::Unknown => write!(f, "unknown"),
        }
    }
}

const QUOTA_FRAGMENTS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "quota",
    "resource_exhausted",
    "resource exhausted",
    "too many requests",
];

const OVERLOAD_FRAGMENTS: &[&str] = &[
    "overloaded",
    "overload",
    "service unavailable",
    "temporarily unavailable",
    "capacity",
    "try again later",
];

const AUTH_FRAGMENTS: &[&str] = &[
    "api key not valid",
    "invalid api key",
    "invalid_api_key",
    "api_key_invalid",
    "unauthorized",
    "unauthenticated",
    "permission denied",
    "permission_denied",
];

/// Classify an upstream failure by status first, then by message.
pub fn classify(error: &UpstreamError) -> ErrorClass {
    match error.status {
        Some(429) => return ErrorClass::Quota,
        Some(503) | Some(529) => return ErrorClass::Overload,
        Some(401) | Some(403) => return ErrorClass::Auth,
        _ => {}
    }

    let message = error.message.to_ascii_lowercase();
    let mentions = |fragments: &[&str]| fragments.iter().any(|f| message.contains(f));

    if mentions(QUOTA_FRAGMENTS) {
        ErrorClass::Quota
    } else if mentions(OVERLOAD_FRAGMENTS) {
        ErrorClass::Overload
    } else if mentions(AUTH_FRAGMENTS) {
        ErrorClass::Auth
    } else {
        ErrorClass::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_win() {
        assert_eq!(classify(&UpstreamError::http(429, "slow down")), ErrorClass::Quota);
        assert_eq!(classify(&UpstreamError::http(503, "")), ErrorClass::Overload);
        assert_eq!(classify(&UpstreamError::http(529, "")), ErrorClass::Overload);
        assert_eq!(classify(&UpstreamError::http(401, "quota")), ErrorClass::Auth);
    }

    #[test]
    fn unavailable_without_capacity_context_is_not_overload() {
        assert_ne!(
            classify(&UpstreamError::other("model unavailable in region")),
            ErrorClass::Overload
        );
        assert_ne!(
            classify(&UpstreamError::http(404, "Model gemini-x is unavailable")),
            ErrorClass::Overload
        );
        assert_eq!(
            classify(&UpstreamError::other("Backend temporarily unavailable")),
            ErrorClass::Overload
        );
        assert_eq!(
            classify(&UpstreamError::http(503, "model unavailable in region")),
            ErrorClass::Overload
        );
    }

    #[test]
    fn message_fragments() {
        assert_eq!(
            classify(&UpstreamError::other("RESOURCE_EXHAUSTED: Quota exceeded for model")),
            ErrorClass::Quota
        );
        assert_eq!(
            classify(&UpstreamError::http(500, "The model is overloaded")),
            ErrorClass::Overload
        );
        assert_eq!(
            classify(&UpstreamError::http(400, "API key not valid. Please pass a valid API key.")),
            ErrorClass::Auth
        );
        assert_eq!(
            classify(&UpstreamError::http(400, "invalid JSON in prompt")),
            ErrorClass::Unknown
        );
    }

    #[test]
    fn only_overload_and_quota_are_capacity() {
        assert!(ErrorClass::Overload.is_capacity());
        assert!(ErrorClass::Quota.is_capacity());
        assert!(!ErrorClass::Auth.is_capacity());
        assert!(!ErrorClass::Unknown.is_capacity());
    }
}
