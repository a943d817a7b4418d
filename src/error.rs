//! Error handling for the check-host client

use std::time::Duration;
use thiserror::Error;

/// Custom error types for the check-host client
#[derive(Error, Debug)]
pub enum CheckHostError {
    /// Transport-level failures (connection, TLS, per-request timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with an error marker
    #[error("Service error: {0}")]
    Service(String),

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// The poll deadline elapsed without usable results
    #[error("Timed out after {}s waiting for results", .0.as_secs())]
    Timeout(Duration),

    /// Caller-supplied input was rejected before any network call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The service produced no usable data
    #[error("No data returned by the service")]
    NoData,
}

impl CheckHostError {
    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new service error
    pub fn service<S: Into<String>>(message: S) -> Self {
        Self::Service(message.into())
    }

    /// Create a new parse error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new invalid-input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport(_) => "TRANSPORT",
            Self::Service(_) => "SERVICE",
            Self::Parse(_) => "PARSE",
            Self::Timeout(_) => "TIMEOUT",
            Self::InvalidInput(_) => "INPUT",
            Self::NoData => "NODATA",
        }
    }

    /// Check if the poll loop may keep going after this error.
    ///
    /// Transport hiccups, undecodable bodies and transient service errors
    /// are retried by the poller within its deadline; the rest abort.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Parse(_) | Self::Service(_))
    }
}

impl From<reqwest::Error> for CheckHostError {
    fn from(error: reqwest::Error) -> Self {
        Self::transport(error.to_string())
    }
}

impl From<serde_json::Error> for CheckHostError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<url::ParseError> for CheckHostError {
    fn from(error: url::ParseError) -> Self {
        Self::invalid_input(format!("URL parse error: {}", error))
    }
}

/// Custom Result type for the check-host client
pub type Result<T> = std::result::Result<T, CheckHostError>;
