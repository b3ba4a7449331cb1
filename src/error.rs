//! Error types for the tempmail service.

use thiserror::Error;

/// Common error type for tempmail.
#[derive(Error, Debug)]
pub enum TempmailError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or oversized input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown mailbox, message or attachment identity.
    #[error("{0} not found")]
    NotFound(String),

    /// Mailbox past its validity window.
    #[error("mailbox {0} has expired")]
    Expired(String),

    /// A storage path escaped the attachment root, or a file write failed.
    #[error("storage integrity error: {0}")]
    StorageIntegrity(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for TempmailError {
    fn from(e: sqlx::Error) -> Self {
        TempmailError::Database(e.to_string())
    }
}

/// Result type alias for tempmail operations.
pub type Result<T> = std::result::Result<T, TempmailError>;
