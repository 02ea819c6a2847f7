//! In-memory staging store

use crate::incoming::error::IncomingResult;
use crate::incoming::{Sack, StagingStore};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

type Batches = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Default)]
struct Inner {
    num_sacks: Option<u32>,
    sacks: HashMap<Sack, BTreeMap<Uuid, Batches>>,
    next_batch: u64,
}

/// Staging store held in process memory
#[derive(Debug, Default)]
pub struct MemoryStaging {
    inner: RwLock<Inner>,
}

impl MemoryStaging {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StagingStore for MemoryStaging {
    fn name(&self) -> &str {
        "memory"
    }

    async fn num_sacks(&self) -> IncomingResult<Option<u32>> {
        Ok(self.inner.read().await.num_sacks)
    }

    async fn set_num_sacks(&self, num_sacks: u32) -> IncomingResult<()> {
        self.inner.write().await.num_sacks = Some(num_sacks);
        Ok(())
    }

    async fn add_measures(&self, sack: &Sack, metric: &Uuid, data: &[u8]) -> IncomingResult<()> {
        let mut inner = self.inner.write().await;
        let batch = format!("{:020}", inner.next_batch);
        inner.next_batch += 1;
        inner
            .sacks
            .entry(*sack)
            .or_default()
            .entry(*metric)
            .or_default()
            .insert(batch, data.to_vec());
        Ok(())
    }

    async fn list_pending(&self, sack: &Sack) -> IncomingResult<Vec<Uuid>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sacks
            .get(sack)
            .map(|metrics| {
                metrics
                    .iter()
                    .filter(|(_, batches)| !batches.is_empty())
                    .map(|(metric, _)| *metric)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_batches(&self, sack: &Sack, metric: &Uuid) -> IncomingResult<Vec<(String, usize)>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sacks
            .get(sack)
            .and_then(|metrics| metrics.get(metric))
            .map(|batches| {
                batches
                    .iter()
                    .map(|(name, data)| (name.clone(), data.len()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn read_pending(&self, sack: &Sack, metric: &Uuid, batches: &[String]) -> IncomingResult<Vec<Vec<u8>>> {
        let inner = self.inner.read().await;
        let stored = inner.sacks.get(sack).and_then(|metrics| metrics.get(metric));
        Ok(batches
            .iter()
            .map(|name| {
                stored
                    .and_then(|s| s.get(name))
                    .cloned()
                    .unwrap_or_default()
            })
            .collect())
    }

    async fn clear(&self, sack: &Sack, metric: &Uuid, batches: &[String]) -> IncomingResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(metrics) = inner.sacks.get_mut(sack) {
            if let Some(stored) = metrics.get_mut(metric) {
                for name in batches {
                    stored.remove(name);
                }
                if stored.is_empty() {
                    metrics.remove(metric);
                }
            }
        }
        Ok(())
    }
}
