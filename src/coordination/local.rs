//! In-process coordinator
//!
//! Locks and group membership shared by the workers of a single process.

use crate::coordination::error::{CoordinationError, CoordinationResult};
use crate::coordination::lock::LockManager;
use crate::coordination::partition::GroupMembership;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::Notify;

/// Coordinator for workers living in one process
#[derive(Debug)]
pub struct LocalCoordinator {
    held: Mutex<HashSet<String>>,
    released: Notify,
    groups: Mutex<HashMap<String, BTreeSet<String>>>,
    partitioning: bool,
}

impl Default for LocalCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalCoordinator {
    pub fn new() -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            released: Notify::new(),
            groups: Mutex::new(HashMap::new()),
            partitioning: true,
        }
    }

    /// A coordinator offering locks only, like backends without groups
    pub fn without_partitioning() -> Self {
        Self {
            partitioning: false,
            ..Self::new()
        }
    }

    fn try_take(&self, name: &str) -> CoordinationResult<bool> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| CoordinationError::Backend("lock table poisoned".to_string()))?;
        Ok(held.insert(name.to_string()))
    }

    pub fn is_locked(&self, name: &str) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(name))
            .unwrap_or(false)
    }
}

#[async_trait]
impl LockManager for LocalCoordinator {
    async fn acquire(&self, name: &str, blocking: bool) -> CoordinationResult<bool> {
        loop {
            // Register for wakeups before checking, so a release in between is not missed
            let released = self.released.notified();
            if self.try_take(name)? {
                return Ok(true);
            }
            if !blocking {
                return Ok(false);
            }
            released.await;
        }
    }

    fn release(&self, name: &str) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(name);
        }
        self.released.notify_waiters();
    }
}

#[async_trait]
impl GroupMembership for LocalCoordinator {
    async fn join_group(&self, group: &str, member: &str) -> CoordinationResult<()> {
        if !self.partitioning {
            return Err(CoordinationError::NotImplemented("partitioned groups".to_string()));
        }
        let mut groups = self
            .groups
            .lock()
            .map_err(|_| CoordinationError::Backend("group table poisoned".to_string()))?;
        groups
            .entry(group.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn leave_group(&self, group: &str, member: &str) -> CoordinationResult<()> {
        let mut groups = self
            .groups
            .lock()
            .map_err(|_| CoordinationError::Backend("group table poisoned".to_string()))?;
        if let Some(members) = groups.get_mut(group) {
            members.remove(member);
        }
        Ok(())
    }

    async fn members(&self, group: &str) -> CoordinationResult<Vec<String>> {
        if !self.partitioning {
            return Err(CoordinationError::NotImplemented("partitioned groups".to_string()));
        }
        let groups = self
            .groups
            .lock()
            .map_err(|_| CoordinationError::Backend("group table poisoned".to_string()))?;
        Ok(groups
            .get(group)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }
}
