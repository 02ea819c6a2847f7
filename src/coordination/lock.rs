//! Named mutual-exclusion locks

use crate::coordination::error::CoordinationResult;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Provider of named locks shared by every worker of a deployment
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Try to take `name`; with `blocking`, wait until it is free.
    /// Returns whether the lock is now held by the caller.
    async fn acquire(&self, name: &str, blocking: bool) -> CoordinationResult<bool>;

    /// Release a lock taken with `acquire`
    fn release(&self, name: &str);
}

/// Name of the lock guarding one metric's raw buffer and chunks
pub fn metric_lock_name(metric: &Uuid) -> String {
    format!("carbonara-metric-{}-lock", metric)
}

/// Held lock, released when dropped
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    manager: Arc<dyn LockManager>,
    name: String,
}

impl LockGuard {
    /// Acquire `name`, returning `None` if it is held elsewhere and
    /// `blocking` is false
    pub async fn acquire(
        manager: &Arc<dyn LockManager>,
        name: impl Into<String>,
        blocking: bool,
    ) -> CoordinationResult<Option<LockGuard>> {
        let name = name.into();
        if manager.acquire(&name, blocking).await? {
            Ok(Some(LockGuard {
                manager: manager.clone(),
                name,
            }))
        } else {
            Ok(None)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.manager.release(&self.name);
        tracing::trace!("Released lock {}", self.name);
    }
}
