//! File-backed locks
//!
//! One lock file per name under a shared directory, held with an exclusive
//! advisory lock. Every process working on the same data directory, and
//! every worker within one process, excludes the others.

use crate::coordination::error::{CoordinationError, CoordinationResult};
use crate::coordination::lock::LockManager;
use async_trait::async_trait;
use fs4::FileExt;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Lock manager shared across processes through lock files
#[derive(Debug)]
pub struct FileLockManager {
    root: PathBuf,
    held: Mutex<HashMap<String, File>>,
}

impl FileLockManager {
    /// Open (and create if needed) the lock directory
    pub async fn open(root: impl Into<PathBuf>) -> CoordinationResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(backend)?;
        Ok(Self {
            root,
            held: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock_file(&self, name: &str) -> CoordinationResult<File> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(CoordinationError::Backend(format!("invalid lock name {:?}", name)));
        }
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.root.join(name))
            .map_err(backend)
    }

    fn keep(&self, name: &str, file: File) -> CoordinationResult<()> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| CoordinationError::Backend("lock table poisoned".to_string()))?;
        held.insert(name.to_string(), file);
        Ok(())
    }
}

fn backend(err: io::Error) -> CoordinationError {
    CoordinationError::Backend(err.to_string())
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs4::lock_contended_error().raw_os_error()
}

#[async_trait]
impl LockManager for FileLockManager {
    async fn acquire(&self, name: &str, blocking: bool) -> CoordinationResult<bool> {
        let file = self.lock_file(name)?;

        if !blocking {
            return match file.try_lock_exclusive() {
                Ok(()) => self.keep(name, file).map(|_| true),
                Err(e) if is_contended(&e) => Ok(false),
                Err(e) => Err(backend(e)),
            };
        }

        let file = tokio::task::spawn_blocking(move || file.lock_exclusive().map(|_| file))
            .await
            .map_err(|e| CoordinationError::Backend(e.to_string()))?
            .map_err(backend)?;
        self.keep(name, file).map(|_| true)
    }

    fn release(&self, name: &str) {
        let file = self.held.lock().ok().and_then(|mut held| held.remove(name));
        if let Some(file) = file {
            // Closing the file drops the lock as well
            if let Err(e) = file.unlock() {
                tracing::warn!("Unable to unlock {}: {}", name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::lock::{metric_lock_name, LockGuard};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_exclusive_across_managers() {
        let dir = tempdir().unwrap();
        // Two managers on one directory stand for two processes
        let first = FileLockManager::open(dir.path()).await.unwrap();
        let second = FileLockManager::open(dir.path()).await.unwrap();
        let name = metric_lock_name(&Uuid::new_v4());

        assert!(first.acquire(&name, false).await.unwrap());
        assert!(!second.acquire(&name, false).await.unwrap());

        first.release(&name);
        assert!(second.acquire(&name, false).await.unwrap());
        assert!(!first.acquire(&name, false).await.unwrap());
        second.release(&name);
    }

    #[tokio::test]
    async fn test_blocking_waits_for_release() {
        let dir = tempdir().unwrap();
        let first: Arc<dyn LockManager> = Arc::new(FileLockManager::open(dir.path()).await.unwrap());
        let second: Arc<dyn LockManager> = Arc::new(FileLockManager::open(dir.path()).await.unwrap());
        let name = metric_lock_name(&Uuid::new_v4());

        let guard = LockGuard::acquire(&first, name.clone(), false).await.unwrap().unwrap();
        let waiter = {
            let second = second.clone();
            let name = name.clone();
            tokio::spawn(async move { LockGuard::acquire(&second, name, true).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        let acquired = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(acquired.is_some());
    }

    #[tokio::test]
    async fn test_rejects_path_names() {
        let dir = tempdir().unwrap();
        let locks = FileLockManager::open(dir.path().join("locks")).await.unwrap();

        assert!(locks.root().is_dir());
        assert!(locks.acquire("../escape", false).await.is_err());
        assert!(locks.acquire("", false).await.is_err());
    }
}
