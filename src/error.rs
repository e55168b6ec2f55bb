//! Error types for newswire.

use thiserror::Error;

/// Common error type for newswire.
#[derive(Error, Debug)]
pub enum NewswireError {
    /// Invalid input from the command interface (unknown source, duplicate add).
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested change is already in place.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Feed fetch or parse failure. Always transient.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Message could not be delivered to a channel.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Durable store read or write failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl NewswireError {
    /// Whether the next poll cycle is expected to retry the failed work.
    pub fn is_transient(&self) -> bool {
        matches!(self, NewswireError::Fetch(_) | NewswireError::Delivery(_))
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for NewswireError {
    fn from(e: sqlx::Error) -> Self {
        NewswireError::Storage(e.to_string())
    }
}

/// Result type alias for newswire operations.
pub type Result<T> = std::result::Result<T, NewswireError>;
