//! Timer record and the state machine governing its transitions.
//!
//! Every transition is a pure function of the current record and a clock
//! reading: it either mutates the record completely or returns an error and
//! leaves it untouched. Persistence and per-timer serialization live in the
//! manager.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::seconds_between;
use crate::error::{EngineError, Result};

/// Largest manual elapsed override: one leap year.
pub const MAX_ELAPSED_SECONDS: i64 = 366 * 24 * 60 * 60;

/// Opaque timer identity. A new one is minted for every started session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(Uuid);

impl TimerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TimerId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    Running,
    Paused,
    /// Worklog submission is in flight.
    LoggedPending,
    Logged,
    Discarded,
}

impl TimerStatus {
    /// Logged or Discarded. No further transition applies.
    pub fn is_terminal(self) -> bool {
        matches!(self, TimerStatus::Logged | TimerStatus::Discarded)
    }

    /// Running or Paused: time can still be added or removed.
    pub fn is_live(self) -> bool {
        matches!(self, TimerStatus::Running | TimerStatus::Paused)
    }

    /// Stable lowercase name, as persisted.
    pub fn as_str(self) -> &'static str {
        match self {
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
            TimerStatus::LoggedPending => "logged_pending",
            TimerStatus::Logged => "logged",
            TimerStatus::Discarded => "discarded",
        }
    }
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Events a caller (or the submission outcome) can apply to a timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Pause,
    Resume,
    Discard,
    StopAndLog,
    SetElapsed,
    CompleteLog,
    FailLog,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Pause => "pause",
            Action::Resume => "resume",
            Action::Discard => "discard",
            Action::StopAndLog => "stop and log",
            Action::SetElapsed => "set elapsed on",
            Action::CompleteLog => "complete log of",
            Action::FailLog => "fail log of",
        }
    }

    fn allowed_from(self, status: TimerStatus) -> bool {
        use TimerStatus::*;
        match self {
            Action::Pause | Action::SetElapsed => status == Running,
            Action::Resume => status == Paused,
            Action::Discard | Action::StopAndLog => status.is_live(),
            Action::CompleteLog | Action::FailLog => status == LoggedPending,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One work session against an external issue.
///
/// `running_since` is `Some` exactly when `status` is `Running`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    pub id: TimerId,
    pub issue_key: String,
    pub summary: String,
    #[serde(rename = "state")]
    pub status: TimerStatus,
    pub accumulated_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_since: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Timer {
    /// Creates a running timer anchored at `now`.
    pub fn start(issue_key: impl Into<String>, summary: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: TimerId::new(),
            issue_key: issue_key.into(),
            summary: summary.into(),
            status: TimerStatus::Running,
            accumulated_seconds: 0,
            running_since: Some(now),
            created_at: now,
        }
    }

    /// Banked seconds plus the open running interval, if any.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> u64 {
        match (self.status, self.running_since) {
            (TimerStatus::Running, Some(since)) => self
                .accumulated_seconds
                .saturating_add(seconds_between(since, now)),
            _ => self.accumulated_seconds,
        }
    }

    /// Fails with `InvalidTransition` unless `action` is valid from the current state.
    pub fn ensure_allows(&self, action: Action) -> Result<()> {
        if action.allowed_from(self.status) {
            Ok(())
        } else {
            Err(EngineError::InvalidTransition {
                id: self.id,
                status: self.status,
                action,
            })
        }
    }

    /// Banks the running interval up to `now` and stops counting.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_allows(Action::Pause)?;
        self.fold_running_interval(now);
        self.status = TimerStatus::Paused;
        Ok(())
    }

    /// Starts a new running interval at `now`.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_allows(Action::Resume)?;
        self.status = TimerStatus::Running;
        self.running_since = Some(now);
        Ok(())
    }

    /// Terminates the timer without logging. Returns the abandoned seconds.
    pub fn discard(&mut self, now: DateTime<Utc>) -> Result<u64> {
        self.ensure_allows(Action::Discard)?;
        self.fold_running_interval(now);
        self.status = TimerStatus::Discarded;
        Ok(self.accumulated_seconds)
    }

    /// Freezes the elapsed total and marks the submission in flight. Returns the seconds to log.
    pub fn begin_log(&mut self, now: DateTime<Utc>) -> Result<u64> {
        self.ensure_allows(Action::StopAndLog)?;
        self.fold_running_interval(now);
        self.status = TimerStatus::LoggedPending;
        Ok(self.accumulated_seconds)
    }

    /// The tracker accepted the worklog.
    pub fn complete_log(&mut self) -> Result<()> {
        self.ensure_allows(Action::CompleteLog)?;
        self.status = TimerStatus::Logged;
        Ok(())
    }

    /// Returns a failed submission to `Paused` with the banked seconds untouched.
    pub fn fail_log(&mut self) -> Result<()> {
        self.ensure_allows(Action::FailLog)?;
        self.status = TimerStatus::Paused;
        self.running_since = None;
        Ok(())
    }

    /// Manual correction: elapsed becomes exactly `seconds` and keeps running from `now`.
    pub fn set_elapsed(&mut self, seconds: i64, now: DateTime<Utc>) -> Result<()> {
        if !(0..=MAX_ELAPSED_SECONDS).contains(&seconds) {
            return Err(EngineError::InvalidArgument(format!(
                "elapsed seconds must be between 0 and {}, got {}",
                MAX_ELAPSED_SECONDS, seconds
            )));
        }
        self.ensure_allows(Action::SetElapsed)?;
        self.accumulated_seconds = seconds as u64;
        self.running_since = Some(now);
        Ok(())
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> TimerSnapshot {
        TimerSnapshot {
            id: self.id,
            issue_key: self.issue_key.clone(),
            summary: self.summary.clone(),
            status: self.status,
            paused: self.status != TimerStatus::Running,
            elapsed_seconds: self.elapsed_at(now),
            created_at: self.created_at,
        }
    }

    fn fold_running_interval(&mut self, now: DateTime<Utc>) {
        if let Some(since) = self.running_since.take() {
            self.accumulated_seconds = self
                .accumulated_seconds
                .saturating_add(seconds_between(since, now));
        }
    }
}

/// Read-only view of a timer with elapsed time resolved at a single instant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimerSnapshot {
    pub id: TimerId,
    pub issue_key: String,
    pub summary: String,
    pub status: TimerStatus,
    pub paused: bool,
    pub elapsed_seconds: u64,
    pub created_at: DateTime<Utc>,
}
