//! Turns a frozen timer into exactly one worklog request.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use log::{info, warn};

use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::records::WorklogRecord;
use crate::timer::{Action, Timer, TimerStatus};
use crate::tracker::WorklogTracker;

/// Issues a single create-worklog call per invocation. It never retries;
/// retrying is the user repeating stop-and-log on the reverted timer.
pub struct WorklogSubmitter<T> {
    tracker: Arc<T>,
    clock: Arc<dyn Clock>,
}

impl<T: WorklogTracker> WorklogSubmitter<T> {
    pub fn new(tracker: Arc<T>, clock: Arc<dyn Clock>) -> Self {
        Self { tracker, clock }
    }

    /// Submits `seconds` for a timer in `LoggedPending`. The timer is only read.
    pub async fn submit(&self, timer: &Timer, seconds: u64) -> Result<WorklogRecord> {
        if timer.status != TimerStatus::LoggedPending {
            return Err(EngineError::InvalidTransition {
                id: timer.id,
                status: timer.status,
                action: Action::CompleteLog,
            });
        }
        if seconds == 0 {
            return Err(EngineError::InvalidArgument(
                "cannot log a worklog of zero seconds".to_string(),
            ));
        }

        let now = self.clock.now();
        let started = started_before(now, seconds).ok_or_else(|| {
            EngineError::InvalidArgument(format!(
                "worklog of {}s would start before the representable range",
                seconds
            ))
        })?;
        match self
            .tracker
            .submit_worklog(&timer.issue_key, seconds, started)
            .await
        {
            Ok(external_worklog_id) => {
                info!(
                    "Logged {}s on {} as worklog {}",
                    seconds, timer.issue_key, external_worklog_id
                );
                Ok(WorklogRecord {
                    timer_id: timer.id,
                    issue_key: timer.issue_key.clone(),
                    seconds_logged: seconds,
                    started_at: started,
                    submitted_at: now,
                    external_worklog_id,
                })
            }
            Err(source) => {
                if source.is_transport() {
                    warn!(
                        "Worklog submission for {} did not reach Jira: {}",
                        timer.issue_key, source
                    );
                } else {
                    warn!("Worklog submission for {} failed: {}", timer.issue_key, source);
                }
                Err(EngineError::SubmissionFailed {
                    issue_key: timer.issue_key.clone(),
                    source,
                })
            }
        }
    }
}

/// `now` minus `seconds`, or `None` when that instant is not representable.
fn started_before(now: DateTime<Utc>, seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    now.checked_sub_signed(TimeDelta::try_seconds(seconds)?)
}
