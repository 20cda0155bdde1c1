//! Timer lifecycle and Jira worklog synchronization engine.
//!
//! Timers accumulate elapsed time from anchors rather than ticks, survive
//! restarts through [`TimerStore`], and are committed to Jira as a worklog
//! at most once through [`TimerManager::stop_and_log`].

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod lease;
pub mod manager;
pub mod reconcile;
pub mod records;
pub mod store;
pub mod submitter;
pub mod timer;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigManager};
pub use error::{ConfigError, EngineError, Result, StoreError};
pub use events::TimerEvent;
pub use history::HistoryRecorder;
pub use manager::TimerManager;
pub use reconcile::{ReconciledWorklog, ReconciliationReport};
pub use records::{HistoryEntry, HistoryOutcome, WorklogRecord};
pub use store::TimerStore;
pub use timer::{Timer, TimerId, TimerSnapshot, TimerStatus};
pub use tracker::WorklogTracker;

/// Installs the process-wide logger (`RUST_LOG`, default `info`).
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

/// Formats elapsed seconds as `1h 05m` or `5m`.
pub fn format_elapsed(elapsed: u64) -> String {
    let hours = elapsed / 3600;
    let minutes = (elapsed % 3600) / 60;
    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
