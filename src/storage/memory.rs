//! In-memory blob store

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::BlobStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Blob store backed by an ordered map
#[derive(Debug)]
pub struct MemoryBlobStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    partial_writes: bool,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            partial_writes: true,
        }
    }

    /// A store that only accepts whole-object writes
    pub fn without_partial_writes() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            partial_writes: false,
        }
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        self.objects.write().await.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let objects = self.objects.read().await;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn supports_partial_writes(&self) -> bool {
        self.partial_writes
    }

    async fn put_at(&self, key: &str, offset: usize, data: &[u8]) -> StorageResult<()> {
        if !self.partial_writes {
            return Err(StorageError::Backend(format!(
                "memory store configured without partial writes (key {})",
                key
            )));
        }

        let mut objects = self.objects.write().await;
        let object = objects.entry(key.to_string()).or_default();
        let end = offset + data.len();
        if object.len() < end {
            object.resize(end, 0);
        }
        object[offset..end].copy_from_slice(data);
        Ok(())
    }
}
