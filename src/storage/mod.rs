//! Carbonara blob storage
//!
//! This module provides the persistence layer for raw buffers and chunks:
//!
//! - **memory**: In-process blob store, used by tests and single-node setups
//! - **file**: Directory-tree blob store with byte-range patch writes
//! - **metric**: Typed access to one metric's objects (raw buffer, chunks)
//! - **error**: Error types
//!
//! # Object layout
//!
//! ```text
//! {metric}/none                                   raw buffer
//! {metric}/agg_{method}/{split_key}_{granularity} one chunk, integers in ns
//! ```

pub mod error;
pub mod file;
pub mod memory;
pub mod metric;

use async_trait::async_trait;

pub use error::{StorageError, StorageResult};
pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;
pub use metric::MetricStore;

/// Key/value object store holding opaque byte blobs
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Backend name, for logs
    fn name(&self) -> &str;

    /// Create or replace an object
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()>;

    /// Read a whole object; `NotFound` if it does not exist
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Remove an object; removing a missing object is not an error
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Keys starting with `prefix`, sorted
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Whether `put_at` is available
    fn supports_partial_writes(&self) -> bool {
        false
    }

    /// Write `data` at byte `offset` of an object, creating or growing it.
    /// Bytes between the old end and `offset` read back as zero.
    async fn put_at(&self, key: &str, _offset: usize, _data: &[u8]) -> StorageResult<()> {
        Err(StorageError::Backend(format!(
            "{} does not support partial writes (key {})",
            self.name(),
            key
        )))
    }
}
