//! Timer manager: validates transitions, persists them and drives worklog submission.

use std::sync::Arc;

use chrono::NaiveDate;
use jira_api::JiraError;
use log::{debug, error, info, warn};
use tokio::sync::broadcast;

use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::events::{EventBus, TimerEvent};
use crate::history::HistoryRecorder;
use crate::lease::{TimerLease, TimerLeases};
use crate::reconcile::{ReconciliationQuery, ReconciliationReport};
use crate::records::HistoryEntry;
use crate::store::TimerStore;
use crate::submitter::WorklogSubmitter;
use crate::timer::{Action, Timer, TimerId, TimerSnapshot};
use crate::tracker::WorklogTracker;

/// Jira rejects worklogs shorter than a minute.
pub const DEFAULT_MIN_WORKLOG_SECONDS: u64 = 60;

/// Sole owner of timer mutation. Cheap to clone; clones share all state.
pub struct TimerManager<T> {
    inner: Arc<ManagerInner<T>>,
}

impl<T> Clone for TimerManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ManagerInner<T> {
    store: TimerStore,
    history: HistoryRecorder,
    clock: Arc<dyn Clock>,
    leases: TimerLeases,
    events: EventBus,
    submitter: WorklogSubmitter<T>,
    reconciliation: ReconciliationQuery<T>,
    min_worklog_seconds: u64,
}

impl<T: WorklogTracker + 'static> TimerManager<T> {
    pub fn new(
        store: TimerStore,
        history: HistoryRecorder,
        tracker: Arc<T>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_min_worklog_seconds(store, history, tracker, clock, DEFAULT_MIN_WORKLOG_SECONDS)
    }

    pub fn with_min_worklog_seconds(
        store: TimerStore,
        history: HistoryRecorder,
        tracker: Arc<T>,
        clock: Arc<dyn Clock>,
        min_worklog_seconds: u64,
    ) -> Self {
        let submitter = WorklogSubmitter::new(Arc::clone(&tracker), Arc::clone(&clock));
        let reconciliation = ReconciliationQuery::new(tracker, store.clone());
        Self {
            inner: Arc::new(ManagerInner {
                store,
                history,
                clock,
                leases: TimerLeases::new(),
                events: EventBus::new(),
                submitter,
                reconciliation,
                min_worklog_seconds: min_worklog_seconds.max(1),
            }),
        }
    }

    /// Starts a new timer. Other timers on the same issue are left alone.
    pub fn start_timer(&self, issue_key: &str, summary: &str) -> Result<TimerId> {
        let issue_key = issue_key.trim();
        if issue_key.is_empty() {
            return Err(EngineError::InvalidArgument(
                "issue key must not be empty".to_string(),
            ));
        }

        let timer = Timer::start(issue_key, summary.trim(), self.inner.clock.now());
        self.inner.store.put(&timer)?;
        info!("Started timer {} for {}", timer.id, timer.issue_key);
        self.inner.events.emit(TimerEvent::Started {
            id: timer.id,
            issue_key: timer.issue_key.clone(),
        });
        Ok(timer.id)
    }

    /// Pauses a running timer, folding the running interval into its total.
    pub fn pause_timer(&self, id: TimerId) -> Result<()> {
        let _lease = self.inner.leases.try_acquire(id)?;
        let now = self.inner.clock.now();
        let (timer, ()) = self.inner.store.update(id, |timer| timer.pause(now))?;
        debug!("Paused timer {} at {}s", id, timer.accumulated_seconds);
        self.inner.events.emit(TimerEvent::Paused {
            id,
            elapsed_seconds: timer.accumulated_seconds,
        });
        Ok(())
    }

    /// Resumes a paused timer; it keeps counting from its accumulated total.
    pub fn resume_timer(&self, id: TimerId) -> Result<()> {
        let _lease = self.inner.leases.try_acquire(id)?;
        let now = self.inner.clock.now();
        self.inner.store.update(id, |timer| timer.resume(now))?;
        debug!("Resumed timer {}", id);
        self.inner.events.emit(TimerEvent::Resumed { id });
        Ok(())
    }

    /// Terminates the timer without logging and records the abandoned time.
    pub fn discard_timer(&self, id: TimerId) -> Result<()> {
        let _lease = self.inner.leases.try_acquire(id)?;
        let now = self.inner.clock.now();
        let (timer, seconds) = self.inner.store.update(id, |timer| timer.discard(now))?;
        info!("Discarded timer {} for {} ({}s)", id, timer.issue_key, seconds);
        self.record_history(HistoryEntry::discarded(&timer, seconds, now));
        self.inner.events.emit(TimerEvent::Discarded {
            id,
            elapsed_seconds: seconds,
        });
        Ok(())
    }

    /// Overrides elapsed time of a running timer.
    pub fn set_elapsed(&self, id: TimerId, seconds: i64) -> Result<()> {
        let _lease = self.inner.leases.try_acquire(id)?;
        let now = self.inner.clock.now();
        let (timer, ()) = self
            .inner
            .store
            .update(id, |timer| timer.set_elapsed(seconds, now))?;
        info!("Set elapsed of timer {} to {}s", id, timer.accumulated_seconds);
        self.inner.events.emit(TimerEvent::ElapsedSet {
            id,
            elapsed_seconds: timer.accumulated_seconds,
        });
        Ok(())
    }

    /// Stops the timer and logs its elapsed time to the tracker.
    ///
    /// The submission runs on its own task holding the timer's lease, so
    /// dropping the returned future does not abandon a request in flight.
    /// On failure the timer is back in `Paused` with its time intact.
    pub async fn stop_and_log(&self, id: TimerId) -> Result<u64> {
        let lease = self.inner.leases.try_acquire(id)?;
        let issue_key = self
            .inner
            .store
            .get(id)
            .map(|timer| timer.issue_key)
            .ok_or(EngineError::NotFound(id))?;

        let manager = self.clone();
        let task = tokio::spawn(async move { manager.log_under_lease(lease, id).await });
        match task.await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => std::panic::resume_unwind(join_error.into_panic()),
            Err(join_error) => Err(EngineError::SubmissionFailed {
                issue_key,
                source: JiraError::Other(format!("submission task cancelled: {}", join_error)),
            }),
        }
    }

    async fn log_under_lease(&self, _lease: TimerLease, id: TimerId) -> Result<u64> {
        // Held until the outcome is stored so no other process recovers the timer meanwhile.
        let mut submission = self.inner.store.submission_lock(id)?;
        let Some(_hold) = submission.try_hold()? else {
            debug!("Timer {} is being submitted elsewhere", id);
            return Err(EngineError::Busy(id));
        };

        let min_seconds = self.inner.min_worklog_seconds;
        let now = self.inner.clock.now();
        let (timer, seconds) = self.inner.store.update(id, |timer| {
            timer.ensure_allows(Action::StopAndLog)?;
            let elapsed = timer.elapsed_at(now);
            if elapsed < min_seconds {
                return Err(EngineError::InvalidArgument(format!(
                    "worklog must be at least {}s, timer has {}s",
                    min_seconds, elapsed
                )));
            }
            timer.begin_log(now)
        })?;
        self.inner.events.emit(TimerEvent::LogPending { id, seconds });

        self.finish_log(timer, seconds).await
    }

    async fn finish_log(&self, mut timer: Timer, seconds: u64) -> Result<u64> {
        let id = timer.id;
        match self.inner.submitter.submit(&timer, seconds).await {
            Ok(record) => {
                timer.complete_log()?;
                if let Err(err) = self.inner.store.settle(&timer, Some(&record)) {
                    error!(
                        "Worklog {} for {} was created but could not be saved: {}",
                        record.external_worklog_id, timer.issue_key, err
                    );
                    return Err(err.into());
                }
                self.record_history(HistoryEntry::logged(&timer, &record));
                self.inner.events.emit(TimerEvent::Logged {
                    id,
                    seconds,
                    external_worklog_id: record.external_worklog_id,
                });
                Ok(seconds)
            }
            Err(submit_error) => {
                timer.fail_log()?;
                if let Err(err) = self.inner.store.settle(&timer, None) {
                    error!("Timer {} is paused again but could not be saved: {}", id, err);
                }
                self.inner.events.emit(TimerEvent::LogFailed {
                    id,
                    error: submit_error.to_string(),
                });
                Err(submit_error)
            }
        }
    }

    /// Non-terminal timers with elapsed time resolved at one instant.
    pub fn list_active_timers(&self) -> Vec<TimerSnapshot> {
        let now = self.inner.clock.now();
        self.inner
            .store
            .active()
            .iter()
            .map(|timer| timer.snapshot(now))
            .collect()
    }

    /// Any timer this manager has seen, terminal ones included.
    pub fn get_timer(&self, id: TimerId) -> Result<TimerSnapshot> {
        self.inner
            .store
            .get(id)
            .map(|timer| timer.snapshot(self.inner.clock.now()))
            .ok_or(EngineError::NotFound(id))
    }

    /// Terminal outcomes, newest first.
    pub fn list_history(&self) -> Vec<HistoryEntry> {
        self.inner.history.list()
    }

    /// Remote worklogs in `[start, end]` matched against local records.
    pub async fn reconcile(&self, start: NaiveDate, end: NaiveDate) -> Result<ReconciliationReport> {
        self.inner.reconciliation.run(start, end).await
    }

    /// Subscribes to transition notifications. Drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.inner.events.subscribe()
    }

    fn record_history(&self, entry: HistoryEntry) {
        let timer_id = entry.timer_id;
        if let Err(err) = self.inner.history.record(entry) {
            warn!("Failed to append history for timer {}: {}", timer_id, err);
        }
    }
}
