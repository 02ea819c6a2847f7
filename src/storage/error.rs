//! Blob store error types
//!
//! Defines all errors that can occur in the storage layer.

use crate::carbonara::CarbonaraError;
use thiserror::Error;

/// Errors that can occur in a blob store
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested object does not exist
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Stored bytes could not be decoded
    #[error("Corrupt data: {0}")]
    Corruption(String),
}

impl From<CarbonaraError> for StorageError {
    fn from(err: CarbonaraError) -> Self {
        StorageError::Corruption(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
