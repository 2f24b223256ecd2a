//! Categorized violation records.
//!
//! Records are the only thing counted toward automatic termination. They are
//! appended to a [`ViolationLedger`] for the lifetime of one attempt and never
//! removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::signal::ViolationSignal;

/// Category a violation is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCategory {
    /// Left the quiz tab or window.
    TabSwitch,
    /// Attempted to capture or export the screen contents.
    Screenshot,
    /// Automation tooling or machine-assisted lookup.
    Automation,
    /// Devtools, view-source, save-page and similar.
    Other,
}

impl ViolationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCategory::TabSwitch => "tab_switch",
            ViolationCategory::Screenshot => "screenshot",
            ViolationCategory::Automation => "automation",
            ViolationCategory::Other => "other",
        }
    }
}

impl fmt::Display for ViolationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A counted violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub category: ViolationCategory,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl ViolationRecord {
    pub fn new(
        category: ViolationCategory,
        reason: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            category,
            reason: reason.into(),
            timestamp,
        }
    }

    /// File a raw signal directly as a violation.
    pub fn from_signal(signal: &ViolationSignal) -> Self {
        Self::new(signal.kind.category(), signal.kind.describe(), signal.timestamp)
    }
}

/// Append-only list of violation records for one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViolationLedger {
    records: Vec<ViolationRecord>,
}

impl ViolationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, returning the new total.
    pub fn append(&mut self, record: ViolationRecord) -> usize {
        self.records.push(record);
        self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn as_slice(&self) -> &[ViolationRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&ViolationRecord> {
        self.records.last()
    }

    /// Number of records filed under a category.
    pub fn count_of(&self, category: ViolationCategory) -> usize {
        self.records
            .iter()
            .filter(|r| r.category == category)
            .count()
    }

    pub fn to_vec(&self) -> Vec<ViolationRecord> {
        self.records.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use crate::signal::SignalKind;

    #[test]
    fn test_record_from_signal() {
        let signal = ViolationSignal::new(SignalKind::CanvasExport, Utc::now(), Platform::Desktop);
        let record = ViolationRecord::from_signal(&signal);
        assert_eq!(record.category, ViolationCategory::Screenshot);
        assert_eq!(record.timestamp, signal.timestamp);
    }

    #[test]
    fn test_ledger_is_append_only() {
        let mut ledger = ViolationLedger::new();
        let now = Utc::now();
        assert_eq!(
            ledger.append(ViolationRecord::new(ViolationCategory::TabSwitch, "left", now)),
            1
        );
        assert_eq!(
            ledger.append(ViolationRecord::new(ViolationCategory::Other, "devtools", now)),
            2
        );
        assert_eq!(ledger.count_of(ViolationCategory::TabSwitch), 1);
        assert_eq!(ledger.last().map(|r| r.category), Some(ViolationCategory::Other));
    }

    #[test]
    fn test_category_serde() {
        let json = serde_json::to_string(&ViolationCategory::TabSwitch).unwrap();
        assert_eq!(json, "\"tab_switch\"");
    }
}
