//! Typed errors for the scraping core.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so the orchestrator
//! can tell transient failures apart from permanent ones.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::job::JobStatus;

/// Errors that end (or interrupt) a scrape job.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The compliance gate refused the target URL.
    #[error("Access denied: robots.txt policy disallows automated scraping of {url}")]
    PolicyBlocked { url: String },

    /// The first page timed out and nothing was collected.
    #[error("no data found at {url}: first page timed out before any records loaded")]
    NoDataFound { url: String },

    /// Browser session crashed or could not start.
    #[error("browser driver failure: {0}")]
    Driver(#[from] BrowserError),

    /// Job was aborted by its orchestrator.
    #[error("job cancelled")]
    Cancelled,

    /// The submitted request cannot be executed.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A worker task panicked or was aborted before reporting.
    #[error("worker task failed: {0}")]
    Worker(String),

    /// A job state change that the state machine does not allow.
    #[error("invalid job transition from {from:?} to {to:?}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

impl ScrapeError {
    /// Classify this error for the retry policy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScrapeError::Driver(_) => ErrorKind::Retryable,
            ScrapeError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::NonRetryable,
        }
    }

    /// Whether the job may re-enter Running after this error.
    pub fn is_retryable(&self) -> bool {
        self.kind().should_retry()
    }

    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        ScrapeError::Storage(Box::new(err))
    }
}

/// Retry classification of a job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transient error - will retry if attempts remain
    #[default]
    Retryable,
    /// Permanent error - will not retry
    NonRetryable,
    /// Job was cancelled by the orchestrator
    Cancelled,
}

impl ErrorKind {
    /// Whether this error kind should trigger a retry
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorKind::Retryable)
    }
}

/// Errors raised by a browser session.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Browser could not be launched.
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// Navigation failed outright (not a timeout).
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// A script evaluation or DOM command failed.
    #[error("browser command failed: {0}")]
    Command(String),

    /// The session was already closed or the browser crashed.
    #[error("browser session closed")]
    Closed,
}

/// Errors from the robots policy fetcher.
#[derive(Debug, Error)]
pub enum ComplianceError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Robots document could not be read as text
    #[error("unreadable robots document at {url}")]
    Unreadable { url: String },

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

/// Errors from an external text-generation service.
#[derive(Debug, Error)]
pub enum AiError {
    /// Service not configured
    #[error("AI service not configured: {0}")]
    NotConfigured(String),

    /// Network failure
    #[error("AI request failed: {0}")]
    Network(String),

    /// Non-success response from the service
    #[error("AI service returned an error: {0}")]
    Api(String),

    /// Response could not be interpreted
    #[error("unparseable AI response: {0}")]
    Parse(String),

    /// The call did not finish in time
    #[error("AI request timed out")]
    Timeout,
}

/// Errors from selector handling in the layout detector.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("invalid CSS selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),
}

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value `{value}`")]
    InvalidValue { name: &'static str, value: String },
}

/// Result type alias for job operations.
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for browser operations.
pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

/// Result type alias for AI operations.
pub type AiResult<T> = std::result::Result<T, AiError>;
