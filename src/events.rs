//! Live notifications for collaborators that want to follow timer changes.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::timer::TimerId;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TimerEvent {
    Started { id: TimerId, issue_key: String },
    Paused { id: TimerId, elapsed_seconds: u64 },
    Resumed { id: TimerId },
    ElapsedSet { id: TimerId, elapsed_seconds: u64 },
    Discarded { id: TimerId, elapsed_seconds: u64 },
    LogPending { id: TimerId, seconds: u64 },
    Logged { id: TimerId, seconds: u64, external_worklog_id: String },
    LogFailed { id: TimerId, error: String },
}

/// Fan-out channel; a dropped receiver is an unsubscribed one.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TimerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.sender.subscribe()
    }

    /// Never blocks; with no subscribers the event is dropped.
    pub fn emit(&self, event: TimerEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
