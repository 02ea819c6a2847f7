//! Staging store error types

use thiserror::Error;

/// Errors that can occur while staging or reading pending measures
#[derive(Error, Debug)]
pub enum IncomingError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A staged batch could not be decoded
    #[error("Invalid staged data: {0}")]
    InvalidData(String),

    /// The number of sacks is not stored yet, or could not be read
    #[error("Unable to detect the number of sacks: {0}")]
    SackDetection(String),
}

impl From<serde_json::Error> for IncomingError {
    fn from(err: serde_json::Error) -> Self {
        IncomingError::SackDetection(err.to_string())
    }
}

/// Result type alias for staging operations
pub type IncomingResult<T> = Result<T, IncomingError>;
