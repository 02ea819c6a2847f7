//! Filesystem staging store
//!
//! Each batch is its own file, written to a temporary directory first and
//! renamed into place so a reader never sees a partial batch. The sack count
//! lives in a small JSON settings file.

use crate::incoming::error::{IncomingError, IncomingResult};
use crate::incoming::{Sack, StagingStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const TMP_DIR: &str = "tmp";
const SETTINGS_FILE: &str = "carbonara-config";
const MAX_PUBLISH_ATTEMPTS: usize = 8;

#[derive(Debug, Serialize, Deserialize)]
struct Settings {
    sacks: u32,
}

/// Staging store rooted at a directory
#[derive(Debug, Clone)]
pub struct FileStaging {
    root: PathBuf,
}

impl FileStaging {
    /// Open (and create if needed) a staging store rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> IncomingResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join(TMP_DIR)).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn sack_path(&self, sack: &Sack) -> PathBuf {
        self.root.join(sack.name())
    }

    fn metric_path(&self, sack: &Sack, metric: &Uuid) -> PathBuf {
        self.sack_path(sack).join(metric.to_string())
    }

    fn settings_path(&self) -> PathBuf {
        self.root.join(TMP_DIR).join(SETTINGS_FILE)
    }

    /// Move a written batch into its metric directory.
    ///
    /// A worker clearing the metric may remove the directory at any time,
    /// so it is recreated until the rename lands.
    async fn publish_batch(tmp: &Path, dir: &Path, batch: &str) -> std::io::Result<()> {
        let mut attempts = 0;
        loop {
            match tokio::fs::rename(tmp, dir.join(batch)).await {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound && attempts < MAX_PUBLISH_ATTEMPTS => {
                    attempts += 1;
                    tokio::fs::create_dir_all(dir).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn list_dir(path: &Path) -> IncomingResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(path).await {
            Ok(entries) => entries,
            // Another worker processed it in the meantime
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl StagingStore for FileStaging {
    fn name(&self) -> &str {
        "file"
    }

    async fn num_sacks(&self) -> IncomingResult<Option<u32>> {
        match tokio::fs::read(self.settings_path()).await {
            Ok(data) => Ok(Some(serde_json::from_slice::<Settings>(&data)?.sacks)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_num_sacks(&self, num_sacks: u32) -> IncomingResult<()> {
        let data = serde_json::to_vec(&Settings { sacks: num_sacks })
            .map_err(|e| IncomingError::InvalidData(e.to_string()))?;
        tokio::fs::write(self.settings_path(), data).await?;
        for number in 0..num_sacks {
            tokio::fs::create_dir_all(self.sack_path(&Sack::new(number, num_sacks))).await?;
        }
        Ok(())
    }

    async fn add_measures(&self, sack: &Sack, metric: &Uuid, data: &[u8]) -> IncomingResult<()> {
        let batch = format!(
            "{:020}_{}",
            crate::carbonara::types::now(),
            Uuid::new_v4()
        );
        let tmp = self.root.join(TMP_DIR).join(&batch);
        tokio::fs::write(&tmp, data).await?;

        let dir = self.metric_path(sack, metric);
        if let Err(e) = Self::publish_batch(&tmp, &dir, &batch).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn list_pending(&self, sack: &Sack) -> IncomingResult<Vec<Uuid>> {
        let mut metrics = Vec::new();
        for name in Self::list_dir(&self.sack_path(sack)).await? {
            match Uuid::parse_str(&name) {
                Ok(metric) => metrics.push(metric),
                Err(_) => tracing::error!("Unable to parse {} as an UUID, ignoring metric", name),
            }
        }
        Ok(metrics)
    }

    async fn list_batches(&self, sack: &Sack, metric: &Uuid) -> IncomingResult<Vec<(String, usize)>> {
        let dir = self.metric_path(sack, metric);
        let mut batches = Vec::new();
        for name in Self::list_dir(&dir).await? {
            match tokio::fs::metadata(dir.join(&name)).await {
                Ok(meta) => batches.push((name, meta.len() as usize)),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(batches)
    }

    async fn read_pending(&self, sack: &Sack, metric: &Uuid, batches: &[String]) -> IncomingResult<Vec<Vec<u8>>> {
        let dir = self.metric_path(sack, metric);
        let mut data = Vec::with_capacity(batches.len());
        for name in batches {
            match tokio::fs::read(dir.join(name)).await {
                Ok(bytes) => data.push(bytes),
                Err(e) if e.kind() == ErrorKind::NotFound => data.push(Vec::new()),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(data)
    }

    async fn clear(&self, sack: &Sack, metric: &Uuid, batches: &[String]) -> IncomingResult<()> {
        let dir = self.metric_path(sack, metric);
        for name in batches {
            match tokio::fs::remove_file(dir.join(name)).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        // Fails harmlessly when new batches arrived meanwhile
        if let Err(e) = tokio::fs::remove_dir(&dir).await {
            if e.kind() != ErrorKind::NotFound {
                tracing::debug!("Keeping {}: {}", dir.display(), e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carbonara::Measure;
    use crate::incoming::{encode_measures, Incoming};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_settings() {
        let dir = tempdir().unwrap();
        let store = FileStaging::open(dir.path()).await.unwrap();

        assert_eq!(store.num_sacks().await.unwrap(), None);
        store.set_num_sacks(4).await.unwrap();
        assert_eq!(store.num_sacks().await.unwrap(), Some(4));
        assert!(dir.path().join("incoming4-3").is_dir());
    }

    #[tokio::test]
    async fn test_batches_on_disk() {
        let dir = tempdir().unwrap();
        let store = FileStaging::open(dir.path()).await.unwrap();
        let metric = Uuid::new_v4();
        let sack = Sack::for_metric(&metric, 2);

        store
            .add_measures(&sack, &metric, &encode_measures(&[Measure::new(1, 1.0)]))
            .await
            .unwrap();
        store
            .add_measures(&sack, &metric, &encode_measures(&[Measure::new(2, 2.0)]))
            .await
            .unwrap();

        assert_eq!(store.list_pending(&sack).await.unwrap(), vec![metric]);
        let batches = store.list_batches(&sack, &metric).await.unwrap();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|(_, size)| *size == 16));
        assert!(dir
            .path()
            .join(sack.name())
            .join(metric.to_string())
            .join(&batches[0].0)
            .is_file());

        let names: Vec<String> = batches.into_iter().map(|(n, _)| n).collect();
        store.clear(&sack, &metric, &names).await.unwrap();
        assert!(store.list_pending(&sack).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_after_metric_directory_removed() {
        let dir = tempdir().unwrap();
        let store = FileStaging::open(dir.path()).await.unwrap();
        let metric = Uuid::new_v4();
        let sack = Sack::for_metric(&metric, 2);
        let data = encode_measures(&[Measure::new(1, 1.0)]);

        store.add_measures(&sack, &metric, &data).await.unwrap();
        let names: Vec<String> = store
            .list_batches(&sack, &metric)
            .await
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        store.clear(&sack, &metric, &names).await.unwrap();
        assert!(!store.metric_path(&sack, &metric).exists());

        store.add_measures(&sack, &metric, &data).await.unwrap();
        assert_eq!(store.list_batches(&sack, &metric).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_recreates_directory() {
        let dir = tempdir().unwrap();
        let tmp = dir.path().join("batch");
        tokio::fs::write(&tmp, b"data").await.unwrap();
        let target = dir.path().join("sack").join("metric");

        FileStaging::publish_batch(&tmp, &target, "batch").await.unwrap();
        assert!(target.join("batch").is_file());
        assert!(!tmp.exists());

        // A missing source is not retried forever
        let err = FileStaging::publish_batch(&tmp, &target, "other").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_incoming_over_files() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FileStaging::open(dir.path()).await.unwrap());
        Incoming::upgrade(store.as_ref(), 8).await.unwrap();
        let incoming = Incoming::open(store).await.unwrap();
        let metric = Uuid::new_v4();

        incoming
            .add_measures(&metric, &[Measure::new(5, 1.0), Measure::new(6, 2.0)])
            .await
            .unwrap();
        let staged = incoming.read_pending(&metric).await.unwrap();
        assert_eq!(staged.measures().len(), 2);
        staged.commit().await.unwrap();
        assert!(!incoming.has_unprocessed(&metric).await.unwrap());
    }

    #[tokio::test]
    async fn test_ignores_foreign_entries() {
        let dir = tempdir().unwrap();
        let store = FileStaging::open(dir.path()).await.unwrap();
        store.set_num_sacks(1).await.unwrap();
        let sack = Sack::new(0, 1);

        tokio::fs::create_dir_all(dir.path().join(sack.name()).join("not-a-uuid"))
            .await
            .unwrap();
        assert!(store.list_pending(&sack).await.unwrap().is_empty());
    }
}
