//! Error types for vigil-session.

use thiserror::Error;
use vigil_keypool::KeyPoolError;
use vigil_proctor::ProctorError;
use vigil_types::{AnswerChoice, QuestionId};

use crate::session::SessionState;

/// Errors raised by the quiz session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Name or registration id missing.
    #[error("student name and registration id are required")]
    InvalidIdentity,

    /// The operation is not allowed in the current state.
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        state: SessionState,
        action: &'static str,
    },

    /// Manual submission with unanswered questions.
    #[error("{unanswered} of {total} questions unanswered")]
    Incomplete { unanswered: usize, total: usize },

    #[error("unknown question: {0}")]
    UnknownQuestion(QuestionId),

    #[error("choice {choice} is not an option of question {question}")]
    InvalidChoice {
        question: QuestionId,
        choice: AnswerChoice,
    },

    /// Persisting a manual submission failed; the attempt is active again.
    #[error("failed to save attempt, please retry: {0}")]
    Persistence(#[source] CollaboratorError),

    /// Persisting a violation-triggered submission failed after its retry.
    #[error("failed to save flagged attempt after {attempts} attempts: {source}")]
    PersistenceFatal {
        attempts: u32,
        #[source]
        source: CollaboratorError,
    },

    #[error(transparent)]
    Proctor(#[from] ProctorError),

    #[error(transparent)]
    Ai(#[from] KeyPoolError),
}

/// Failure reported by an external collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// Could not reach the collaborator.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// The collaborator refused the request.
    #[error("collaborator rejected request: {0}")]
    Rejected(String),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
