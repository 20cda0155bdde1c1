//! Error types surfaced by the timer engine.

use std::path::PathBuf;

use jira_api::JiraError;
use thiserror::Error;

use crate::timer::{Action, TimerId, TimerStatus};

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure of a single engine operation. None of these are fatal to the process.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested action is not valid in the timer's current state.
    #[error("cannot {action} timer {id} while it is {status}")]
    InvalidTransition {
        id: TimerId,
        status: TimerStatus,
        action: Action,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Another operation on the same timer is in flight; retry later.
    #[error("timer {0} is busy with another operation")]
    Busy(TimerId),

    /// The tracker rejected or never received the worklog. The timer is paused with its time intact.
    #[error("worklog submission for {issue_key} failed: {source}")]
    SubmissionFailed {
        issue_key: String,
        #[source]
        source: JiraError,
    },

    #[error("timer {0} not found")]
    NotFound(TimerId),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// A read-only tracker query failed.
    #[error("tracker query failed: {0}")]
    Tracker(#[source] JiraError),
}

/// Persistence failures of the timer store and history log.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode state: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Problems turning on-disk settings into a usable tracker configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Jira not configured: missing {0}. Set it with `config set` or the JIRA_* environment variables")]
    Missing(&'static str),

    #[error("unknown config key: {0}")]
    UnknownKey(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("could not determine a configuration directory for this platform")]
    NoConfigDir,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode config: {0}")]
    Serialization(#[from] serde_json::Error),
}
