//! Storage error types.

use thiserror::Error;
use tiler_common::ContextError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl From<StoreError> for ContextError {
    fn from(err: StoreError) -> Self {
        ContextError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
