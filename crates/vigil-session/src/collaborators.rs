//! External collaborator seams.
//!
//! Persistence and violation logging live outside this workspace. Both are
//! reached through async traits so hosts can plug in their backend and tests
//! can plug in [`crate::memory`].

use std::sync::Arc;

use async_trait::async_trait;
use vigil_types::{AttemptSession, ViolationLogEntry};

use crate::ai::AiService;
use crate::error::CollaboratorError;

/// Write-once persistence for finished attempts.
#[async_trait]
pub trait AttemptSink: Send + Sync {
    async fn persist(&self, attempt: &AttemptSession) -> Result<(), CollaboratorError>;
}

/// Fire-and-forget violation log endpoint.
#[async_trait]
pub trait ViolationLogSink: Send + Sync {
    async fn post(&self, entry: &ViolationLogEntry) -> Result<(), CollaboratorError>;
}

/// Everything a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub attempts: Arc<dyn AttemptSink>,
    pub violation_log: Arc<dyn ViolationLogSink>,

    /// Post-submission integrity review, when AI is configured.
    pub integrity: Option<Arc<AiService>>,
}

impl Collaborators {
    pub fn new(attempts: Arc<dyn AttemptSink>, violation_log: Arc<dyn ViolationLogSink>) -> Self {
        Self {
            attempts,
            violation_log,
            integrity: None,
        }
    }

    pub fn with_integrity(mut self, ai: Arc<AiService>) -> Self {
        self.integrity = Some(ai);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("integrity", &self.integrity.is_some())
            .finish_non_exhaustive()
    }
}
