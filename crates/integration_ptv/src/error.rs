//! PTV error types

use thiserror::Error;

/// Errors that can occur while talking to the PTV timetable API
#[derive(Debug, Error)]
pub enum PtvError {
    /// Connection to the PTV API failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The API answered with a non-200 status
    #[error("Request failed with HTTP {status}")]
    RequestFailed {
        /// HTTP status code returned by the API
        status: u16,
    },

    /// Request timeout
    #[error("Request timed out after {timeout_secs} seconds")]
    Timeout {
        /// The timeout duration in seconds
        timeout_secs: u64,
    },

    /// Failed to parse a response body
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A single record in a batch could not be normalised
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A setup-time discovery call returned no usable data
    #[error("Discovery of {what} failed: {reason}")]
    DiscoveryFailed {
        /// Which list was being discovered (route types, routes, ...)
        what: &'static str,
        /// Underlying reason
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl PtvError {
    /// Returns true if the next scheduled refresh might succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed(_) | Self::Timeout { .. } => true,
            Self::RequestFailed { status } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
