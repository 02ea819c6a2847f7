//! Coordination error types

use thiserror::Error;

/// Errors raised by a coordination backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinationError {
    /// The backend lacks the requested capability (e.g. partitioning)
    #[error("Not implemented by coordinator: {0}")]
    NotImplemented(String),

    /// Backend failure
    #[error("Coordination backend error: {0}")]
    Backend(String),
}

/// Result type alias for coordination operations
pub type CoordinationResult<T> = Result<T, CoordinationError>;
