//! Persisted attempt shape.
//!
//! An [`AttemptSession`] is written exactly once, when the attempt reaches a
//! terminal status. Field names are camelCase on the wire to match the
//! persistence backend.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AttemptId, QuestionId, QuizId};
use crate::record::ViolationRecord;

/// Index of the option a student selected.
pub type AnswerChoice = u32;

/// Who is taking the quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentIdentity {
    pub name: String,
    pub registration_id: String,
}

impl StudentIdentity {
    /// Build an identity, trimming both fields. Returns `None` if either is blank.
    pub fn new(name: &str, registration_id: &str) -> Option<Self> {
        let name = name.trim();
        let registration_id = registration_id.trim();
        if name.is_empty() || registration_id.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            registration_id: registration_id.to_string(),
        })
    }
}

/// Terminal status of a persisted attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Completed,
    Flagged,
}

/// The write-once record of a finished attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSession {
    pub id: AttemptId,
    pub quiz_id: QuizId,
    pub student_identity: StudentIdentity,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub answers: BTreeMap<QuestionId, AnswerChoice>,
    pub violation_records: Vec<ViolationRecord>,
    pub violation_count: u32,
    pub violation_triggered: bool,
    pub score: u8,
    pub status: AttemptStatus,
    pub is_flagged: bool,
}

impl AttemptSession {
    /// Flagging predicate applied to every terminal attempt.
    pub fn flag_predicate(violation_triggered: bool, violation_count: u32, max_violations: u32) -> bool {
        violation_triggered || violation_count >= max_violations
    }

    pub fn status_for(is_flagged: bool) -> AttemptStatus {
        if is_flagged {
            AttemptStatus::Flagged
        } else {
            AttemptStatus::Completed
        }
    }
}
