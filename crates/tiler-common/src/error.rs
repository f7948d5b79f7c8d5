//! Error types for checkpoint context operations.

use thiserror::Error;

/// Result type alias using ContextError.
pub type ContextResult<T> = Result<T, ContextError>;

/// Errors raised by an [`ExecutionContext`](crate::ExecutionContext) backend.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The backing store could not be read or written
    #[error("Checkpoint backend error: {0}")]
    Backend(String),

    /// A stored value exists but is not an integer
    #[error("Corrupt checkpoint value for '{key}': {message}")]
    Corrupt { key: String, message: String },
}
