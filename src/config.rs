//! Persistent configuration model and file-backed manager.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use jira_api::JiraConfig;

use crate::error::ConfigError;
use crate::manager::DEFAULT_MIN_WORKLOG_SECONDS;

const CONFIG_FILE: &str = "config.json";
const TIMERS_FILE: &str = "timers.json";
const HISTORY_FILE: &str = "history.jsonl";

fn default_min_worklog_seconds() -> u64 {
    DEFAULT_MIN_WORKLOG_SECONDS
}

fn default_request_cooldown_ms() -> u64 {
    jira_api::config::DEFAULT_COOLDOWN_MS
}

/// Jira connection settings, worklog policy and where timer state lives.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub jira_url: String,
    pub email: String,
    pub api_token: String,
    #[serde(default = "default_min_worklog_seconds")]
    pub min_worklog_seconds: u64,
    #[serde(default = "default_request_cooldown_ms")]
    pub request_cooldown_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jira_url: String::new(),
            email: String::new(),
            api_token: String::new(),
            min_worklog_seconds: default_min_worklog_seconds(),
            request_cooldown_ms: default_request_cooldown_ms(),
            data_dir: None,
        }
    }
}

impl Config {
    /// Non-empty `JIRA_URL`, `JIRA_EMAIL` and `JIRA_TOKEN` take precedence over the file.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| env::var(name).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(url) = pick("JIRA_URL") {
            self.jira_url = url;
        }
        if let Some(email) = pick("JIRA_EMAIL") {
            self.email = email;
        }
        if let Some(token) = pick("JIRA_TOKEN") {
            self.api_token = token;
        }
        self
    }

    /// Keys accepted by [`Config::set`].
    pub const KEYS: &'static [&'static str] = &[
        "jira_url",
        "email",
        "api_token",
        "min_worklog_seconds",
        "request_cooldown_ms",
        "data_dir",
    ];

    /// Updates one setting from its textual form. An empty `data_dir` resets it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "jira_url" => self.jira_url = value.trim().trim_end_matches('/').to_string(),
            "email" => self.email = value.trim().to_string(),
            "api_token" => self.api_token = value.trim().to_string(),
            "min_worklog_seconds" => {
                let seconds: u64 = value.trim().parse().map_err(|_| invalid())?;
                if seconds == 0 {
                    return Err(invalid());
                }
                self.min_worklog_seconds = seconds;
            }
            "request_cooldown_ms" => {
                self.request_cooldown_ms = value.trim().parse().map_err(|_| invalid())?;
            }
            "data_dir" => {
                let value = value.trim();
                self.data_dir = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Settings as displayed to the user, with the token masked.
    pub fn redacted(&self) -> Self {
        let mut shown = self.clone();
        if !shown.api_token.is_empty() {
            shown.api_token = "********".to_string();
        }
        shown
    }

    pub fn is_configured(&self) -> bool {
        self.tracker_config().is_ok()
    }

    /// Client settings, or the first missing credential.
    pub fn tracker_config(&self) -> Result<JiraConfig, ConfigError> {
        if self.jira_url.trim().is_empty() {
            return Err(ConfigError::Missing("Jira URL"));
        }
        if self.email.trim().is_empty() {
            return Err(ConfigError::Missing("account email"));
        }
        if self.api_token.trim().is_empty() {
            return Err(ConfigError::Missing("API token"));
        }
        Ok(
            JiraConfig::new(self.jira_url.trim(), self.email.trim(), self.api_token.trim())
                .with_cooldown(Duration::from_millis(self.request_cooldown_ms)),
        )
    }
}

/// Loads and saves the configuration file and resolves state file locations.
pub struct ConfigManager {
    path: PathBuf,
    default_data_dir: PathBuf,
}

impl ConfigManager {
    /// Manager bound to the platform-specific config and data directories.
    pub fn new() -> Result<Self, ConfigError> {
        let dirs = directories::ProjectDirs::from("io", "jira-timesheet", "jira-timesheet")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(Self {
            path: dirs.config_dir().join(CONFIG_FILE),
            default_data_dir: dirs.data_dir().to_path_buf(),
        })
    }

    /// Manager rooted at an explicit directory (config and data side by side).
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            path: dir.join(CONFIG_FILE),
            default_data_dir: dir,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Loads config from disk, falling back to defaults on read/parse errors.
    pub fn load(&self) -> Config {
        if self.path.exists() {
            let content = fs::read_to_string(&self.path).unwrap_or_default();
            match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(err) => {
                    log::warn!(
                        "Ignoring unreadable config {}: {}",
                        self.path.display(),
                        err
                    );
                    Config::default()
                }
            }
        } else {
            Config::default()
        }
    }

    /// Persists config to disk, creating parent directories when needed.
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn data_dir(&self, config: &Config) -> PathBuf {
        config
            .data_dir
            .clone()
            .unwrap_or_else(|| self.default_data_dir.clone())
    }

    pub fn timers_path(&self, config: &Config) -> PathBuf {
        self.data_dir(config).join(TIMERS_FILE)
    }

    pub fn history_path(&self, config: &Config) -> PathBuf {
        self.data_dir(config).join(HISTORY_FILE)
    }
}
