use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Worklog object as Jira returns it from the issue worklog endpoints.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct IssueWorklog {
    pub id: String,
    pub author: Option<WorklogAuthor>,
    #[serde(default)]
    pub time_spent_seconds: u64,
    pub started: Option<String>,
    #[serde(default)]
    pub issue_id: Option<String>,
}

impl IssueWorklog {
    /// Calendar date of `started` (`2024-01-15T09:00:00.000+0000` -> 2024-01-15).
    pub fn started_date(&self) -> Option<NaiveDate> {
        let started = self.started.as_deref()?;
        let day: String = started.chars().take(10).collect();
        NaiveDate::parse_from_str(&day, "%Y-%m-%d").ok()
    }

    pub fn is_authored_by(&self, account_id: &str) -> bool {
        self.author
            .as_ref()
            .map(|author| author.account_id == account_id)
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WorklogAuthor {
    pub account_id: String,
    pub display_name: Option<String>,
}

/// One worklog of the current user, flattened with the issue it belongs to.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserWorklog {
    pub worklog_id: String,
    pub issue_key: String,
    pub summary: String,
    pub date: NaiveDate,
    pub started: String,
    pub time_spent_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worklog(started: Option<&str>, author: Option<&str>) -> IssueWorklog {
        IssueWorklog {
            id: "10001".to_string(),
            author: author.map(|id| WorklogAuthor {
                account_id: id.to_string(),
                display_name: None,
            }),
            time_spent_seconds: 60,
            started: started.map(str::to_string),
            issue_id: None,
        }
    }

    #[test]
    fn started_date_takes_calendar_day() {
        let entry = worklog(Some("2024-01-15T23:30:00.000+0300"), None);
        assert_eq!(entry.started_date(), NaiveDate::from_ymd_opt(2024, 1, 15));
    }

    #[test]
    fn started_date_is_none_for_garbage() {
        assert!(worklog(Some("yesterday"), None).started_date().is_none());
        assert!(worklog(None, None).started_date().is_none());
    }

    #[test]
    fn authorship_requires_matching_account() {
        let entry = worklog(None, Some("abc"));
        assert!(entry.is_authored_by("abc"));
        assert!(!entry.is_authored_by("xyz"));
        assert!(!worklog(None, None).is_authored_by("abc"));
    }

    #[test]
    fn deserializes_jira_payload() {
        let json = r#"{
            "id": "10042",
            "issueId": "10000",
            "author": {"accountId": "557058:f00", "displayName": "Ada"},
            "started": "2024-01-15T09:00:00.000+0000",
            "timeSpentSeconds": 5400
        }"#;
        let entry: IssueWorklog = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, "10042");
        assert_eq!(entry.time_spent_seconds, 5400);
        assert!(entry.is_authored_by("557058:f00"));
    }
}
