//! Error types for granule access.

use thiserror::Error;

/// Result type for granule operations.
pub type GranuleResult<T> = Result<T, GranuleError>;

/// Error types for granule access.
#[derive(Error, Debug)]
pub enum GranuleError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// File not recognized or unparsable
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// Missing required variable or dimension
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Handle could not be released
    #[error("Failed to close granule: {0}")]
    CloseFailed(String),
}
