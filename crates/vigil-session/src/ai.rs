//! AI collaborators, reached through the credential pool.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use vigil_keypool::{CredentialLease, KeyPool, KeyPoolResult, UpstreamError};
use vigil_types::AttemptSession;

use crate::quiz::Quiz;

/// What to generate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizRequest {
    pub topic: String,
    pub question_count: usize,
    #[serde(default)]
    pub difficulty: Option<String>,
}

impl QuizRequest {
    pub fn new(topic: impl Into<String>, question_count: usize) -> Self {
        Self {
            topic: topic.into(),
            question_count,
            difficulty: None,
        }
    }
}

/// Post-hoc judgement on a finished attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityVerdict {
    pub is_cheating: bool,
    pub reason: String,
}

/// An AI provider. Every call receives the credential leased for it.
#[async_trait]
pub trait AiBackend: Send + Sync {
    async fn generate_quiz(
        &self,
        lease: &CredentialLease,
        request: &QuizRequest,
    ) -> Result<Quiz, UpstreamError>;

    async fn review_integrity(
        &self,
        lease: &CredentialLease,
        attempt: &AttemptSession,
    ) -> Result<IntegrityVerdict, UpstreamError>;
}

/// AI operations with credential failover.
pub struct AiService {
    backend: Arc<dyn AiBackend>,
    pool: Arc<KeyPool>,
}

impl AiService {
    pub fn new(backend: Arc<dyn AiBackend>, pool: Arc<KeyPool>) -> Self {
        Self { backend, pool }
    }

    pub fn pool(&self) -> &Arc<KeyPool> {
        &self.pool
    }

    #[instrument(skip(self), fields(topic = %request.topic))]
    pub async fn generate_quiz(&self, request: &QuizRequest) -> KeyPoolResult<Quiz> {
        let quiz = self
            .pool
            .run_with_failover(|lease| {
                let backend = Arc::clone(&self.backend);
                async move { backend.generate_quiz(&lease, request).await }
            })
            .await?;
        info!(quiz_id = %quiz.id, questions = quiz.len(), "Quiz generated");
        Ok(quiz)
    }

    #[instrument(skip(self, attempt), fields(attempt_id = %attempt.id))]
    pub async fn review_integrity(&self, attempt: &AttemptSession) -> KeyPoolResult<IntegrityVerdict> {
        self.pool
            .run_with_failover(|lease| {
                let backend = Arc::clone(&self.backend);
                async move { backend.review_integrity(&lease, attempt).await }
            })
            .await
    }
}

impl std::fmt::Debug for AiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiService").field("pool", &self.pool).finish()
    }
}
