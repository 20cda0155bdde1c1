//! Error model used by Jira API client operations.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, JiraError>;

/// Failure modes of a Jira request: non-success responses, rejected credentials, transport problems and undecodable payloads.
#[derive(Debug, Error)]
pub enum JiraError {
    #[error("http {status}: {message}")]
    Http { status: StatusCode, message: String },
    #[error("authentication error: {0}")]
    Authentication(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unexpected error: {0}")]
    Other(String),
}

impl JiraError {
    /// Builds an HTTP error, preferring Jira's `errorMessages`/`errors` over the raw body.
    pub fn http(status: StatusCode, body: &str) -> Self {
        JiraError::Http {
            status,
            message: extract_error_message(body).unwrap_or_else(|| body.to_string()),
        }
    }

    /// True for failures where the request may never have reached Jira.
    pub fn is_transport(&self) -> bool {
        matches!(self, JiraError::Timeout(_) | JiraError::Network(_))
    }
}

impl From<reqwest::Error> for JiraError {
    /// Converts reqwest errors into semantic JiraError variants.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            JiraError::Timeout(err.to_string())
        } else if err.is_status() {
            JiraError::Http {
                status: err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                message: err.to_string(),
            }
        } else if err.is_connect() || err.is_request() {
            JiraError::Network(err.to_string())
        } else if err.is_decode() {
            JiraError::Serialization(err.to_string())
        } else {
            JiraError::Other(err.to_string())
        }
    }
}

impl From<serde_json::Error> for JiraError {
    fn from(err: serde_json::Error) -> Self {
        JiraError::Serialization(err.to_string())
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    let mut parts: Vec<String> = value
        .get("errorMessages")
        .and_then(Value::as_array)
        .map(|messages| {
            messages
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if let Some(errors) = value.get("errors").and_then(Value::as_object) {
        for (field, message) in errors {
            if let Some(message) = message.as_str() {
                parts.push(format!("{}: {}", field, message));
            }
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}
