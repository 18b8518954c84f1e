//! Error taxonomy and the structured descriptor stored in `pending_error`.
//!
//! Stale results are not errors and never reach this module; they are
//! dropped by the arbiter check before anything is recorded.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

/// Errors produced by the sync layer and its network collaborator.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The message text was empty after trimming.
    #[error("message text is empty")]
    EmptyText,

    /// No author id was available for an outgoing message.
    #[error("no author id available for message")]
    MissingAuthor,

    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// A required configuration variable is not set.
    #[error("missing config: env var {var} not set")]
    MissingConfig { var: String },

    /// The HTTP request to the message API failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The message API returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The message API response body could not be parsed.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

/// Stable machine-readable classification of an error.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

impl ErrorCode for SyncError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyText => "E_EMPTY_TEXT",
            Self::MissingAuthor => "E_MISSING_AUTHOR",
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::MissingConfig { .. } => "E_MISSING_CONFIG",
            Self::ApiRequest(_) => "E_API_REQUEST",
            Self::ApiResponse { .. } => "E_API_RESPONSE",
            Self::ApiParse(_) => "E_API_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::ApiRequest(_) | Self::ApiResponse { status: 429 | 500..=599, .. })
    }
}

/// Structured error descriptor recorded on a conversation and handed to callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl ErrorInfo {
    #[must_use]
    pub fn from_error<E: ErrorCode + ?Sized>(err: &E) -> Self {
        Self { code: err.error_code(), message: err.to_string(), retryable: err.retryable() }
    }
}

impl From<&SyncError> for ErrorInfo {
    fn from(err: &SyncError) -> Self {
        Self::from_error(err)
    }
}
