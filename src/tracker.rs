//! Boundary to the external issue tracker.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use jira_api::{JiraClient, UserWorklog};

/// Tracker operations the engine consumes.
pub trait WorklogTracker: Send + Sync {
    /// Creates one worklog and returns the tracker-assigned worklog id.
    fn submit_worklog(
        &self,
        issue_key: &str,
        seconds: u64,
        started: DateTime<Utc>,
    ) -> impl Future<Output = jira_api::Result<String>> + Send;

    /// The current user's worklogs with a start date in `[start, end]`.
    fn list_worklogs_for_user(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = jira_api::Result<Vec<UserWorklog>>> + Send;
}

impl WorklogTracker for JiraClient {
    async fn submit_worklog(
        &self,
        issue_key: &str,
        seconds: u64,
        started: DateTime<Utc>,
    ) -> jira_api::Result<String> {
        let created = self.create_worklog(issue_key, seconds, started).await?;
        Ok(created.id)
    }

    async fn list_worklogs_for_user(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> jira_api::Result<Vec<UserWorklog>> {
        JiraClient::list_worklogs_for_user(self, start, end).await
    }
}
