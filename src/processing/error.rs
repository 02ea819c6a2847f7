//! Processing error types
//!
//! Wraps the errors of every layer a processing cycle touches.

use crate::carbonara::{AggregationMethod, CarbonaraError};
use crate::coordination::CoordinationError;
use crate::incoming::IncomingError;
use crate::indexer::IndexerError;
use crate::storage::StorageError;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while processing or reading a metric
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error(transparent)]
    Carbonara(#[from] CarbonaraError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Incoming(#[from] IncomingError),

    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    #[error(transparent)]
    Indexer(#[from] IndexerError),

    /// The metric's archive policy does not declare this aggregation
    #[error("Aggregation {method} at granularity {granularity}ns does not exist for metric {metric}")]
    AggregationDoesNotExist {
        metric: Uuid,
        method: AggregationMethod,
        granularity: i64,
    },

    /// A lock needed for a synchronous operation is held elsewhere
    #[error("Lock {0} is already held")]
    AlreadyLocked(String),
}

/// Result type alias for processing operations
pub type ProcessingResult<T> = Result<T, ProcessingError>;
