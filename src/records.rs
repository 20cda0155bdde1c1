//! Immutable records produced when a timer reaches a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{Timer, TimerId};

/// A worklog the tracker accepted. Created only from a successful submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorklogRecord {
    pub timer_id: TimerId,
    pub issue_key: String,
    pub seconds_logged: u64,
    /// Start instant sent with the worklog; the tracker files it under this date.
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub external_worklog_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HistoryOutcome {
    Logged { external_worklog_id: String },
    Discarded,
}

/// Audit entry for a timer that terminated, either logged or discarded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timer_id: TimerId,
    pub issue_key: String,
    pub summary: String,
    pub seconds: u64,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: HistoryOutcome,
}

impl HistoryEntry {
    pub fn logged(timer: &Timer, record: &WorklogRecord) -> Self {
        Self {
            timer_id: timer.id,
            issue_key: timer.issue_key.clone(),
            summary: timer.summary.clone(),
            seconds: record.seconds_logged,
            recorded_at: record.submitted_at,
            outcome: HistoryOutcome::Logged {
                external_worklog_id: record.external_worklog_id.clone(),
            },
        }
    }

    pub fn discarded(timer: &Timer, seconds: u64, discarded_at: DateTime<Utc>) -> Self {
        Self {
            timer_id: timer.id,
            issue_key: timer.issue_key.clone(),
            summary: timer.summary.clone(),
            seconds,
            recorded_at: discarded_at,
            outcome: HistoryOutcome::Discarded,
        }
    }

    pub fn is_logged(&self) -> bool {
        matches!(self.outcome, HistoryOutcome::Logged { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_entry_serializes_flat_outcome() {
        let timer = Timer::start("ABC-1", "Review", DateTime::<Utc>::default());
        let record = WorklogRecord {
            timer_id: timer.id,
            issue_key: "ABC-1".to_string(),
            seconds_logged: 90,
            started_at: DateTime::<Utc>::default(),
            submitted_at: DateTime::<Utc>::default(),
            external_worklog_id: "10042".to_string(),
        };

        let entry = HistoryEntry::logged(&timer, &record);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["outcome"], "logged");
        assert_eq!(json["external_worklog_id"], "10042");
        assert_eq!(json["seconds"], 90);

        let back: HistoryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn discarded_entry_is_not_logged() {
        let timer = Timer::start("ABC-1", "", DateTime::<Utc>::default());
        let entry = HistoryEntry::discarded(&timer, 12, DateTime::<Utc>::default());
        assert!(!entry.is_logged());
        assert_eq!(entry.seconds, 12);
    }
}
