#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use jira_api::{JiraError, UserWorklog};
use jira_timesheet::{
    Clock, HistoryRecorder, ManualClock, TimerManager, TimerStore, WorklogTracker,
};
use tokio::sync::Notify;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitCall {
    pub issue_key: String,
    pub seconds: u64,
    pub started: DateTime<Utc>,
}

/// Scripted tracker. Queued results are returned in order; once the queue
/// is empty every submission succeeds with a fresh worklog id.
#[derive(Default)]
pub struct FakeTracker {
    results: Mutex<VecDeque<jira_api::Result<String>>>,
    calls: Mutex<Vec<SubmitCall>>,
    remote: Mutex<Option<jira_api::Result<Vec<UserWorklog>>>>,
    gate: Option<Arc<Notify>>,
    pub entered: Notify,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submissions wait on `gate` after signalling `entered`.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn fail_next(&self, error: JiraError) {
        self.results.lock().unwrap().push_back(Err(error));
    }

    pub fn succeed_next(&self, worklog_id: &str) {
        self.results
            .lock()
            .unwrap()
            .push_back(Ok(worklog_id.to_string()));
    }

    pub fn set_remote(&self, result: jira_api::Result<Vec<UserWorklog>>) {
        *self.remote.lock().unwrap() = Some(result);
    }

    pub fn calls(&self) -> Vec<SubmitCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl WorklogTracker for FakeTracker {
    async fn submit_worklog(
        &self,
        issue_key: &str,
        seconds: u64,
        started: DateTime<Utc>,
    ) -> jira_api::Result<String> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(SubmitCall {
                issue_key: issue_key.to_string(),
                seconds,
                started,
            });
            calls.len()
        };

        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let scripted = self.results.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(format!("{}", 10000 + attempt)))
    }

    async fn list_worklogs_for_user(
        &self,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> jira_api::Result<Vec<UserWorklog>> {
        self.remote
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub struct Harness {
    pub manager: TimerManager<FakeTracker>,
    pub tracker: Arc<FakeTracker>,
    pub clock: Arc<ManualClock>,
    pub store: TimerStore,
    pub history: HistoryRecorder,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_tracker(FakeTracker::new())
    }

    pub fn with_tracker(tracker: FakeTracker) -> Self {
        Self::with_parts(TimerStore::in_memory(), HistoryRecorder::in_memory(), tracker)
    }

    pub fn with_parts(store: TimerStore, history: HistoryRecorder, tracker: FakeTracker) -> Self {
        let tracker = Arc::new(tracker);
        let clock = Arc::new(ManualClock::at_epoch());
        let manager = TimerManager::new(
            store.clone(),
            history.clone(),
            Arc::clone(&tracker),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        Self {
            manager,
            tracker,
            clock,
            store,
            history,
        }
    }

    pub fn elapsed(&self, id: jira_timesheet::TimerId) -> u64 {
        self.manager.get_timer(id).unwrap().elapsed_seconds
    }
}

pub fn remote_worklog(worklog_id: &str, issue_key: &str, seconds: u64, date: NaiveDate) -> UserWorklog {
    UserWorklog {
        worklog_id: worklog_id.to_string(),
        issue_key: issue_key.to_string(),
        summary: format!("{} summary", issue_key),
        date,
        started: format!("{}T09:00:00.000+0000", date),
        time_spent_seconds: seconds,
    }
}
