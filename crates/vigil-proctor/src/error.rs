//! Error types for vigil-proctor.

use thiserror::Error;

/// Errors raised by the proctor engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProctorError {
    /// `arm` was called on an engine that is already monitoring.
    #[error("proctor already armed")]
    AlreadyArmed,

    /// The engine was torn down and cannot be reused.
    #[error("proctor has been torn down")]
    TornDown,

    /// A tunable is out of range.
    #[error("invalid proctor configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for proctor operations.
pub type ProctorResult<T> = Result<T, ProctorError>;
