//! User profile returned by the identity endpoint.

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
/// The authenticated Jira account; `account_id` is what worklog authors are matched against.
pub struct UserProfile {
    pub account_id: String,
    pub display_name: Option<String>,
    pub email_address: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}
