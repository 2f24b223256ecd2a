//! Outbound violation log entries.
//!
//! Posted fire-and-forget for every counted violation. Delivery failures never
//! feed back into proctoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::AttemptId;
use crate::signal::ViolationSignal;

/// Wire shape of a violation log post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationLogEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub user_agent: String,
    pub url: String,
    pub session_id: AttemptId,
}

impl ViolationLogEntry {
    pub fn from_signal(
        signal: &ViolationSignal,
        session_id: AttemptId,
        user_agent: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            kind: signal.kind.log_type().to_string(),
            timestamp: signal.timestamp,
            user_agent: user_agent.into(),
            url: url.into(),
            session_id,
        }
    }
}
