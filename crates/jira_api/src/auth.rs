//! Credential helpers for Jira Cloud basic authentication.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use crate::error::{JiraError, Result};

/// Builds the `Authorization` header value for an account email and API token.
pub fn basic_authorization(email: &str, api_token: &str) -> Result<String> {
    let email = email.trim();
    let api_token = api_token.trim();
    if email.is_empty() || api_token.is_empty() {
        return Err(JiraError::InvalidInput(
            "email and API token are required".to_string(),
        ));
    }
    let encoded = BASE64_STANDARD.encode(format!("{}:{}", email, api_token));
    Ok(format!("Basic {}", encoded))
}
