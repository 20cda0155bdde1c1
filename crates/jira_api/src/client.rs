use crate::auth::basic_authorization;
use crate::config::JiraConfig;
use crate::error::{JiraError, Result};
use crate::models::{IssueWorklog, IssueWorklogPage, UserProfile, UserWorklog, WorklogSearchPage};
use crate::rate_limiter::RateLimiter;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client as HttpClient, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Jira `started` timestamp layout, e.g. `2024-01-15T09:00:00.000+0000`.
pub const JIRA_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

#[derive(Clone)]
pub struct JiraClient {
    http: HttpClient,
    config: JiraConfig,
    limiter: RateLimiter,
}

impl JiraClient {
    pub fn new(config: JiraConfig) -> Result<Self> {
        let http = build_http_client(&config)?;
        Ok(Self {
            http,
            limiter: RateLimiter::new(config.cooldown),
            config,
        })
    }

    pub fn config(&self) -> &JiraConfig {
        &self.config
    }

    pub async fn get<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.get_with_query(path, &[]).await
    }

    pub async fn get_with_query<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.limiter.hit().await;
        let mut request = self.http.get(self.url_for(path));
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send().await?;
        Self::parse_json(response).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.limiter.hit().await;
        let response = self
            .http
            .request(Method::POST, self.url_for(path))
            .json(body)
            .send()
            .await?;
        Self::parse_json(response).await
    }

    fn url_for(&self, path: &str) -> String {
        let mut base = self.config.api_root();
        base.push_str(path.trim_start_matches('/'));
        base
    }

    async fn parse_json<T>(response: Response) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        if status.is_success() {
            response.json::<T>().await.map_err(JiraError::from)
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            Err(JiraError::Authentication(format!(
                "Access denied ({}) - {}",
                status, body
            )))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(JiraError::http(status, &body))
        }
    }

    pub async fn get_myself(&self) -> Result<UserProfile> {
        self.get("myself").await
    }

    /// Creates a worklog of `seconds` on `issue_key` and returns Jira's record of it.
    pub async fn create_worklog(
        &self,
        issue_key: &str,
        seconds: u64,
        started: DateTime<Utc>,
    ) -> Result<IssueWorklog> {
        let issue_key = issue_key.trim();
        if issue_key.is_empty() {
            return Err(JiraError::InvalidInput("issue key is empty".to_string()));
        }
        if seconds == 0 {
            return Err(JiraError::InvalidInput(
                "worklog duration must be positive".to_string(),
            ));
        }

        let path = format!("issue/{}/worklog", issue_key);
        let started = started.format(JIRA_DATETIME_FORMAT).to_string();
        let payload = WorklogCreateRequest {
            time_spent_seconds: seconds,
            started: &started,
        };
        let created: IssueWorklog = self.post(&path, &payload).await?;
        tracing::info!(issue = issue_key, seconds, worklog_id = %created.id, "worklog created");
        Ok(created)
    }

    pub async fn get_issue_worklogs(
        &self,
        issue_key: &str,
        started_after_ms: i64,
    ) -> Result<Vec<IssueWorklog>> {
        let path = format!("issue/{}/worklog", issue_key);
        let page: IssueWorklogPage = self
            .get_with_query(&path, &[("startedAfter", started_after_ms.to_string())])
            .await?;
        Ok(page.worklogs)
    }

    /// Worklogs authored by the authenticated account with a start date in `[start, end]`.
    pub async fn list_worklogs_for_user(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<UserWorklog>> {
        if start > end {
            return Err(JiraError::InvalidInput(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }

        let account_id = self.get_myself().await?.account_id;
        let jql = format!(
            "worklogAuthor=currentUser() AND worklogDate >= \"{}\" AND worklogDate <= \"{}\"",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );

        let page_size = self.config.page_size;
        let mut start_at: u32 = 0;
        let mut issues = Vec::new();
        loop {
            let query = [
                ("jql", jql.clone()),
                ("fields", "summary,worklog".to_string()),
                ("maxResults", page_size.to_string()),
                ("startAt", start_at.to_string()),
            ];
            let page: WorklogSearchPage = self.get_with_query("search", &query).await?;
            let fetched = page.issues.len() as u32;
            issues.extend(page.issues);
            if fetched < page_size {
                break;
            }
            start_at += page_size;
        }
        tracing::debug!(issues = issues.len(), %start, %end, "worklog search finished");

        let started_after_ms = start
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc().timestamp_millis())
            .unwrap_or_default();

        let mut entries = Vec::new();
        for issue in issues {
            let worklogs = match issue.fields.worklog {
                Some(embedded) if embedded.is_complete() => embedded.worklogs,
                _ => self.get_issue_worklogs(&issue.key, started_after_ms).await?,
            };

            for worklog in worklogs {
                if !worklog.is_authored_by(&account_id) {
                    continue;
                }
                let Some(date) = worklog.started_date() else {
                    continue;
                };
                if date < start || date > end {
                    continue;
                }
                entries.push(UserWorklog {
                    worklog_id: worklog.id,
                    issue_key: issue.key.clone(),
                    summary: issue.fields.summary.clone(),
                    date,
                    started: worklog.started.unwrap_or_default(),
                    time_spent_seconds: worklog.time_spent_seconds,
                });
            }
        }

        entries.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.issue_key.cmp(&b.issue_key)));
        Ok(entries)
    }
}

fn build_http_client(config: &JiraConfig) -> Result<HttpClient> {
    let mut headers = HeaderMap::new();

    let authorization = basic_authorization(&config.email, &config.api_token)?;
    let mut auth_value = header_value(authorization)?;
    auth_value.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth_value);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, header_value(config.user_agent.clone())?);

    HttpClient::builder()
        .default_headers(headers)
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(|err| JiraError::Other(err.to_string()))
}

fn header_value(value: String) -> Result<HeaderValue> {
    HeaderValue::from_str(&value).map_err(|err| JiraError::InvalidInput(err.to_string()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorklogCreateRequest<'a> {
    time_spent_seconds: u64,
    started: &'a str,
}
