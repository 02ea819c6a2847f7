//! Filesystem blob store
//!
//! Keys map to relative paths under a root directory. Whole-object writes
//! go through a temporary file and a rename so readers never observe a
//! half-written object; patch writes seek into the file in place.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::BlobStore;
use async_trait::async_trait;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

const TMP_DIR: &str = ".tmp";

/// Blob store rooted at a directory
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Open (and create if needed) a store rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join(TMP_DIR)).await?;
        tracing::debug!("Opened file blob store at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && !key.starts_with(TMP_DIR)
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::Backend(format!("invalid object key: {:?}", key)));
        }
        Ok(self.root.join(relative))
    }

    async fn ensure_parent(path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        let path = self.path_of(key)?;
        Self::ensure_parent(&path).await?;

        let tmp = self
            .root
            .join(TMP_DIR)
            .join(uuid::Uuid::new_v4().to_string());
        tokio::fs::write(&tmp, data).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.path_of(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path_of(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        // Start from the deepest directory fully named by the prefix
        let start = match prefix.rfind('/') {
            Some(idx) => self.root.join(&prefix[..idx]),
            None => self.root.clone(),
        };

        let mut keys = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let relative = match path.strip_prefix(&self.root) {
                    Ok(relative) => relative.to_string_lossy().replace('\\', "/"),
                    Err(_) => continue,
                };
                if relative.starts_with(TMP_DIR) {
                    continue;
                }

                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if relative.starts_with(prefix) {
                    keys.push(relative);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn supports_partial_writes(&self) -> bool {
        true
    }

    async fn put_at(&self, key: &str, offset: usize, data: &[u8]) -> StorageResult<()> {
        let path = self.path_of(key)?;
        Self::ensure_parent(&path).await?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .await?;
        file.seek(SeekFrom::Start(offset as u64)).await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }
}
