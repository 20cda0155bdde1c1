//! Read path comparing local worklog records with the tracker's own record.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use jira_api::UserWorklog;
use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::records::WorklogRecord;
use crate::store::TimerStore;
use crate::tracker::WorklogTracker;

/// A tracker worklog, paired with the local record that produced it when there is one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReconciledWorklog {
    pub remote: UserWorklog,
    pub local: Option<WorklogRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub entries: Vec<ReconciledWorklog>,
    /// Local records submitted in range that the tracker did not return.
    pub local_only: Vec<WorklogRecord>,
}

impl ReconciliationReport {
    pub fn remote_seconds(&self) -> u64 {
        self.entries
            .iter()
            .map(|entry| entry.remote.time_spent_seconds)
            .sum()
    }

    /// Tracker worklogs logged outside this engine (another device, the web UI).
    pub fn unmatched_remote(&self) -> impl Iterator<Item = &UserWorklog> {
        self.entries
            .iter()
            .filter(|entry| entry.local.is_none())
            .map(|entry| &entry.remote)
    }

    /// Remote worklogs whose duration differs from the locally logged seconds.
    pub fn mismatched(&self) -> impl Iterator<Item = &ReconciledWorklog> {
        self.entries.iter().filter(|entry| {
            entry
                .local
                .as_ref()
                .map(|local| local.seconds_logged != entry.remote.time_spent_seconds)
                .unwrap_or(false)
        })
    }
}

pub struct ReconciliationQuery<T> {
    tracker: Arc<T>,
    store: TimerStore,
}

impl<T: WorklogTracker> ReconciliationQuery<T> {
    pub fn new(tracker: Arc<T>, store: TimerStore) -> Self {
        Self { tracker, store }
    }

    /// Fetches the tracker's worklogs for `[start, end]` and matches them by worklog id. Never writes.
    pub async fn run(&self, start: NaiveDate, end: NaiveDate) -> Result<ReconciliationReport> {
        if start > end {
            return Err(EngineError::InvalidArgument(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }

        let remote = self
            .tracker
            .list_worklogs_for_user(start, end)
            .await
            .map_err(EngineError::Tracker)?;

        Ok(build_report(start, end, remote, self.store.worklogs()))
    }
}

fn build_report(
    start: NaiveDate,
    end: NaiveDate,
    remote: Vec<UserWorklog>,
    local: Vec<WorklogRecord>,
) -> ReconciliationReport {
    let mut by_external_id: HashMap<&str, &WorklogRecord> = local
        .iter()
        .map(|record| (record.external_worklog_id.as_str(), record))
        .collect();

    let mut seen: HashSet<String> = HashSet::new();
    let entries = remote
        .into_iter()
        .map(|worklog| {
            seen.insert(worklog.worklog_id.clone());
            let local = by_external_id.remove(worklog.worklog_id.as_str()).cloned();
            ReconciledWorklog {
                remote: worklog,
                local,
            }
        })
        .collect();

    let local_only = local
        .iter()
        .filter(|record| !seen.contains(&record.external_worklog_id))
        .filter(|record| {
            let day = record.started_at.date_naive();
            day >= start && day <= end
        })
        .cloned()
        .collect();

    ReconciliationReport {
        start,
        end,
        entries,
        local_only,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::TimerId;
    use chrono::{TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn remote(id: &str, d: u32, seconds: u64) -> UserWorklog {
        UserWorklog {
            worklog_id: id.to_string(),
            issue_key: "ABC-1".to_string(),
            summary: "Work".to_string(),
            date: day(d),
            started: format!("2024-01-{:02}T09:00:00.000+0000", d),
            time_spent_seconds: seconds,
        }
    }

    fn local(id: &str, d: u32, seconds: u64) -> WorklogRecord {
        WorklogRecord {
            timer_id: TimerId::new(),
            issue_key: "ABC-1".to_string(),
            seconds_logged: seconds,
            started_at: Utc.with_ymd_and_hms(2024, 1, d, 9, 0, 0).unwrap(),
            submitted_at: Utc.with_ymd_and_hms(2024, 1, d, 12, 0, 0).unwrap(),
            external_worklog_id: id.to_string(),
        }
    }

    #[test]
    fn pairs_by_external_id_and_reports_leftovers() {
        let report = build_report(
            day(1),
            day(31),
            vec![remote("1", 2, 600), remote("2", 3, 300), remote("3", 4, 120)],
            vec![local("1", 2, 600), local("3", 4, 60), local("9", 5, 90), local("8", 1, 30)],
        );

        assert_eq!(report.entries.len(), 3);
        assert_eq!(report.remote_seconds(), 1020);
        let unmatched: Vec<&str> = report.unmatched_remote().map(|w| w.worklog_id.as_str()).collect();
        assert_eq!(unmatched, vec!["2"]);
        let mismatched: Vec<&str> = report
            .mismatched()
            .map(|entry| entry.remote.worklog_id.as_str())
            .collect();
        assert_eq!(mismatched, vec!["3"]);
        let local_only: Vec<&str> = report
            .local_only
            .iter()
            .map(|r| r.external_worklog_id.as_str())
            .collect();
        assert_eq!(local_only, vec!["9", "8"]);
    }

    #[test]
    fn local_only_respects_range() {
        let report = build_report(day(10), day(12), Vec::new(), vec![local("1", 9, 60), local("2", 11, 60)]);
        assert_eq!(report.local_only.len(), 1);
        assert_eq!(report.local_only[0].external_worklog_id, "2");
    }

    #[test]
    fn local_only_uses_the_day_the_work_started() {
        let record = WorklogRecord {
            started_at: Utc.with_ymd_and_hms(2024, 1, 1, 22, 30, 0).unwrap(),
            submitted_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 30, 0).unwrap(),
            ..local("7", 1, 7200)
        };

        let first = build_report(day(1), day(1), Vec::new(), vec![record.clone()]);
        assert_eq!(first.local_only, vec![record.clone()]);
        let second = build_report(day(2), day(2), Vec::new(), vec![record]);
        assert!(second.local_only.is_empty());
    }
}
