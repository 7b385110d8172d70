//! Error types for the countdown timer library.

use crate::models::TimerId;

/// Convenience alias for results produced by this crate.
pub type Result<T> = core::result::Result<T, TimerError>;

/// All errors that can occur when storing, serving or fetching timers.
#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    /// A timer (or a draft of one) violates the record invariants.
    #[error("invalid timer: {0}")]
    Validation(String),

    /// No timer exists with the given identifier.
    #[error("timer not found: {0}")]
    NotFound(TimerId),

    /// The HTTP request could not be sent or its body could not be read.
    #[cfg(any(feature = "async", feature = "blocking"))]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The timer API answered with a non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message extracted from the response body.
        message: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Timer storage backend failed.
    #[error("storage error: {0}")]
    Storage(Box<dyn core::error::Error + Send + Sync>),

    /// Socket or filesystem I/O outside the storage backend failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No API base URL was supplied to a client builder.
    #[error("API base URL is not configured")]
    MissingBaseUrl,

    /// A URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A configuration value is malformed.
    #[error("configuration error: {0}")]
    Config(String),
}
