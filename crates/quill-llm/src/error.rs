//! Completion errors.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

/// A 429 from the completion endpoint.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    pub message: String,
    /// From `Retry-After`, when the endpoint sent a number of seconds.
    pub retry_after: Option<Duration>,
}

impl RateLimitInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn from_header(message: impl Into<String>, retry_after_header: Option<&str>) -> Self {
        Self {
            message: message.into(),
            retry_after: retry_after_header
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
        }
    }
}

impl fmt::Display for RateLimitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.retry_after {
            Some(wait) => write!(f, "{} (retry after {}s)", self.message, wait.as_secs()),
            None => f.write_str(&self.message),
        }
    }
}

/// Why a completion call produced no text.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Non-retryable rejection by the endpoint (4xx other than auth and
    /// rate limits, plain 500s, exhausted mocks).
    #[error("completion endpoint error: {0}")]
    Backend(String),

    /// Transport failure, timeout or gateway error. Retried.
    #[error("network error: {0}")]
    Network(String),

    /// Retried after `retry_after` or the current backoff.
    #[error("rate limited: {0}")]
    RateLimit(RateLimitInfo),

    #[error("authentication failed: {0}")]
    Auth(String),

    /// The backend could not be built from its configuration.
    #[error("invalid backend configuration: {0}")]
    Config(String),

    /// The endpoint answered 2xx with a body that is not `{text}`.
    #[error("malformed completion response: {0}")]
    Serialization(String),
}

impl LlmError {
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit(RateLimitInfo::new(message))
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit(info) => info.retry_after,
            _ => None,
        }
    }

    /// Whether [`with_retry`](crate::with_retry) should try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimit(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Serialization(err.to_string())
        } else if err.is_timeout() {
            Self::Network(format!("timed out: {}", err))
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
