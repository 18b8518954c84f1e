//! Sync configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use crate::error::SyncError;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub api_base_url: String,
    pub project_id: String,
    pub api_token: Option<String>,
    pub user_id: Option<i64>,
    pub guest_user_id: Option<i64>,
    pub timeouts: SyncTimeouts,
}

impl SyncConfig {
    /// Build typed sync config from environment variables.
    ///
    /// Required:
    /// - `CHATSYNC_PROJECT_ID`
    ///
    /// Optional:
    /// - `CHATSYNC_API_BASE_URL`: default `http://localhost:8000/api`
    /// - `CHATSYNC_API_TOKEN`: bearer token sent with every request
    /// - `CHATSYNC_USER_ID`: id of the logged-in user
    /// - `CHATSYNC_GUEST_USER_ID`: author id used when no user is logged in
    /// - `CHATSYNC_REQUEST_TIMEOUT_SECS`: default 60
    /// - `CHATSYNC_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error when the project id is missing or a user id is not an integer.
    pub fn from_env() -> Result<Self, SyncError> {
        let project_id = std::env::var("CHATSYNC_PROJECT_ID")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| SyncError::MissingConfig { var: "CHATSYNC_PROJECT_ID".into() })?;
        let api_base_url = std::env::var("CHATSYNC_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let api_token = std::env::var("CHATSYNC_API_TOKEN")
            .ok()
            .filter(|v| !v.is_empty());
        let user_id = parse_user_id("CHATSYNC_USER_ID", std::env::var("CHATSYNC_USER_ID").ok().as_deref())?;
        let guest_user_id =
            parse_user_id("CHATSYNC_GUEST_USER_ID", std::env::var("CHATSYNC_GUEST_USER_ID").ok().as_deref())?;
        let timeouts = SyncTimeouts {
            request_secs: env_parse_u64("CHATSYNC_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("CHATSYNC_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { api_base_url, project_id, api_token, user_id, guest_user_id, timeouts })
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_user_id(key: &str, raw: Option<&str>) -> Result<Option<i64>, SyncError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<i64>()
            .map(Some)
            .map_err(|_| SyncError::ConfigParse(format!("{key} must be an integer, got '{value}'"))),
    }
}
