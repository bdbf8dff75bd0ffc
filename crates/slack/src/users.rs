use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const SLACK_API_BASE_URL: &str = "https://slack.com/api";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("users.info request failed: {0}")]
    Transport(String),
    #[error("slack web api rate limit exceeded (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },
    #[error("users.info returned `{0}`")]
    Api(String),
}

/// Resolves Slack user ids into names shown in the archive.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn display_name(&self, user_id: &str) -> Result<String, DirectoryError>;
}

/// Uses the raw user id as the display name.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughUserDirectory;

#[async_trait]
impl UserDirectory for PassthroughUserDirectory {
    async fn display_name(&self, user_id: &str) -> Result<String, DirectoryError> {
        Ok(user_id.to_string())
    }
}

/// Looks users up through the Slack Web API `users.info` method.
#[derive(Clone)]
pub struct SlackWebUserDirectory {
    client: Client,
    bot_token: SecretString,
    base_url: String,
}

impl SlackWebUserDirectory {
    pub fn new(bot_token: SecretString, timeout: Duration) -> Result<Self, DirectoryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| DirectoryError::Transport(error.to_string()))?;
        Ok(Self { client, bot_token, base_url: SLACK_API_BASE_URL.to_string() })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl UserDirectory for SlackWebUserDirectory {
    async fn display_name(&self, user_id: &str) -> Result<String, DirectoryError> {
        let url = format!("{}/users.info", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.bot_token.expose_secret())
            .query(&[("user", user_id)])
            .send()
            .await
            .map_err(|error| DirectoryError::Transport(error.to_string()))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok());
            return Err(DirectoryError::RateLimited { retry_after });
        }
        if !response.status().is_success() {
            return Err(DirectoryError::Transport(format!(
                "users.info returned http {}",
                response.status()
            )));
        }

        let payload: UsersInfoResponse = response
            .json()
            .await
            .map_err(|error| DirectoryError::Transport(error.to_string()))?;
        let name = payload.into_display_name(user_id)?;
        debug!(event_name = "slack.users.resolved", user_id, "resolved slack display name");
        Ok(name)
    }
}

#[derive(Debug, Deserialize)]
struct UsersInfoResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user: Option<SlackUser>,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    profile: Option<SlackProfile>,
}

#[derive(Debug, Deserialize)]
struct SlackProfile {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
}

impl UsersInfoResponse {
    fn into_display_name(self, user_id: &str) -> Result<String, DirectoryError> {
        if !self.ok {
            if self.error.as_deref() == Some("ratelimited") {
                return Err(DirectoryError::RateLimited { retry_after: None });
            }
            return Err(DirectoryError::Api(self.error.unwrap_or_else(|| "unknown_error".into())));
        }

        let Some(user) = self.user else {
            return Ok(user_id.to_string());
        };
        let profile = user.profile.unwrap_or(SlackProfile { display_name: None, real_name: None });

        Ok([profile.display_name, user.real_name, profile.real_name, user.name]
            .into_iter()
            .flatten()
            .map(|name| name.trim().to_string())
            .find(|name| !name.is_empty())
            .unwrap_or_else(|| user_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{DirectoryError, PassthroughUserDirectory, UserDirectory, UsersInfoResponse};

    fn parse(body: &str) -> UsersInfoResponse {
        serde_json::from_str(body).expect("users.info payload")
    }

    #[tokio::test]
    async fn passthrough_returns_user_id() {
        let name = PassthroughUserDirectory.display_name("U123").await.expect("name");
        assert_eq!(name, "U123");
    }

    #[test]
    fn profile_display_name_is_preferred() {
        let response = parse(
            r#"{"ok":true,"user":{"id":"U1","name":"alice","real_name":"Alice Liddell","profile":{"display_name":"ally","real_name":"Alice Liddell"}}}"#,
        );
        assert_eq!(response.into_display_name("U1"), Ok("ally".to_string()));
    }

    #[test]
    fn blank_display_name_falls_back_to_real_name() {
        let response = parse(
            r#"{"ok":true,"user":{"id":"U1","name":"alice","real_name":"Alice Liddell","profile":{"display_name":"  "}}}"#,
        );
        assert_eq!(response.into_display_name("U1"), Ok("Alice Liddell".to_string()));
    }

    #[test]
    fn user_without_names_falls_back_to_id() {
        let response = parse(r#"{"ok":true,"user":{"id":"U1"}}"#);
        assert_eq!(response.into_display_name("U1"), Ok("U1".to_string()));
    }

    #[test]
    fn api_errors_are_surfaced() {
        assert_eq!(
            parse(r#"{"ok":false,"error":"user_not_found"}"#).into_display_name("U1"),
            Err(DirectoryError::Api("user_not_found".to_string()))
        );
        assert_eq!(
            parse(r#"{"ok":false,"error":"ratelimited"}"#).into_display_name("U1"),
            Err(DirectoryError::RateLimited { retry_after: None })
        );
    }
}
