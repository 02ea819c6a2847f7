//! Shared handles used by processing and reads
//!
//! Built once at startup and passed by reference; there is no global
//! backend state.

use crate::coordination::{GroupMembership, LockManager};
use crate::incoming::Incoming;
use crate::indexer::MetadataProvider;
use crate::storage::MetricStore;
use std::sync::Arc;

/// Backends a worker needs to process metrics
#[derive(Clone)]
pub struct ProcessingContext {
    pub storage: MetricStore,
    pub incoming: Incoming,
    pub indexer: Arc<dyn MetadataProvider>,
    pub locks: Arc<dyn LockManager>,
    pub membership: Arc<dyn GroupMembership>,
    /// Metrics processed concurrently within one sack
    pub parallelism: usize,
}

impl ProcessingContext {
    pub fn new(
        storage: MetricStore,
        incoming: Incoming,
        indexer: Arc<dyn MetadataProvider>,
        locks: Arc<dyn LockManager>,
        membership: Arc<dyn GroupMembership>,
    ) -> Self {
        Self {
            storage,
            incoming,
            indexer,
            locks,
            membership,
            parallelism: default_parallelism(),
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }
}

/// Number of CPUs, or 1 if unknown
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
