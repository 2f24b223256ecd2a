//! Error types for vigil-keypool.

use thiserror::Error;

use crate::classify::{ErrorClass, UpstreamError};

/// Errors surfaced by the credential pool.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyPoolError {
    /// No credential is currently available.
    #[error("credential pool exhausted: no credential available")]
    PoolExhausted,

    /// Every attempt failed with a capacity error.
    #[error("{class} failure: all {tried} credential(s) tried across {attempts} attempt(s), last error: {last_error}")]
    Exhausted {
        class: ErrorClass,
        tried: usize,
        attempts: u32,
        last_error: UpstreamError,
    },

    /// A non-capacity failure, propagated without retrying.
    #[error("{class} failure: {source}")]
    Upstream {
        class: ErrorClass,
        #[source]
        source: UpstreamError,
    },

    /// The label does not name a credential in this pool.
    #[error("unknown credential: {0}")]
    UnknownCredential(String),

    /// The source yielded no usable credential.
    #[error("no credentials configured (looked for {prefix} and {prefix}_1..{prefix}_{max})")]
    NoCredentials { prefix: String, max: usize },
}

impl KeyPoolError {
    /// Classification of the failure, if it came from upstream.
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            KeyPoolError::Exhausted { class, .. } | KeyPoolError::Upstream { class, .. } => Some(*class),
            _ => None,
        }
    }
}

/// Result type for pool operations.
pub type KeyPoolResult<T> = Result<T, KeyPoolError>;
