//! Wire shapes of the JQL search endpoint used for worklog discovery.

use serde::Deserialize;

use super::worklog::IssueWorklog;

#[derive(Debug, Deserialize)]
pub(crate) struct WorklogSearchPage {
    #[serde(default)]
    pub issues: Vec<WorklogSearchIssue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorklogSearchIssue {
    pub key: String,
    pub fields: WorklogSearchFields,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorklogSearchFields {
    #[serde(default)]
    pub summary: String,
    pub worklog: Option<EmbeddedWorklogs>,
}

/// Worklogs embedded in a search hit; Jira truncates this list (`total > maxResults`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EmbeddedWorklogs {
    pub total: u32,
    pub max_results: u32,
    #[serde(default)]
    pub worklogs: Vec<IssueWorklog>,
}

impl EmbeddedWorklogs {
    pub fn is_complete(&self) -> bool {
        self.total <= self.max_results
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct IssueWorklogPage {
    #[serde(default)]
    pub worklogs: Vec<IssueWorklog>,
}
