//! Quiz content as delivered by the authoring backend or generated by AI.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use vigil_types::{AnswerChoice, QuestionId, QuizId};

/// A multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct: AnswerChoice,
}

impl Question {
    pub fn new(
        id: impl Into<String>,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct: AnswerChoice,
    ) -> Self {
        Self {
            id: QuestionId::new(id),
            prompt: prompt.into(),
            options,
            correct,
        }
    }

    pub fn accepts(&self, choice: AnswerChoice) -> bool {
        (choice as usize) < self.options.len()
    }
}

/// A quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: QuizId,
    pub title: String,
    pub questions: Vec<Question>,

    /// Wall-clock limit for one attempt.
    #[serde(default)]
    pub time_limit: Option<Duration>,
}

impl Quiz {
    pub fn new(id: impl Into<String>, title: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            id: QuizId::new(id),
            title: title.into(),
            questions,
            time_limit: None,
        }
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == id)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
