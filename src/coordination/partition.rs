//! Work partitioning across the members of a group
//!
//! Items (sacks) are assigned with rendezvous hashing: each member scores
//! each item with CRC32(member "/" item) and an item belongs to the
//! `replicas` best-scoring members. A membership change only moves the
//! items of the members that joined or left.

use crate::coordination::error::CoordinationResult;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Group membership service
#[async_trait]
pub trait GroupMembership: Send + Sync {
    /// Add `member` to `group`, creating the group if needed.
    /// Backends without partitioning return `NotImplemented`.
    async fn join_group(&self, group: &str, member: &str) -> CoordinationResult<()>;

    async fn leave_group(&self, group: &str, member: &str) -> CoordinationResult<()>;

    /// Current members of `group`
    async fn members(&self, group: &str) -> CoordinationResult<Vec<String>>;
}

/// Rendezvous hash ring over a set of member names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashRing {
    nodes: BTreeSet<String>,
}

impl HashRing {
    pub fn new(nodes: impl IntoIterator<Item = String>) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
        }
    }

    pub fn nodes(&self) -> &BTreeSet<String> {
        &self.nodes
    }

    fn score(node: &str, item: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(node.as_bytes());
        hasher.update(b"/");
        hasher.update(item);
        hasher.finalize()
    }

    /// The `replicas` members owning `item`, best first
    pub fn get_nodes(&self, item: &[u8], replicas: usize) -> Vec<&str> {
        let mut scored: Vec<(u32, &str)> = self
            .nodes
            .iter()
            .map(|node| (Self::score(node, item), node.as_str()))
            .collect();
        // Highest score first, name breaks ties
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        scored
            .into_iter()
            .take(replicas.max(1))
            .map(|(_, node)| node)
            .collect()
    }
}

/// One member's view of a partitioned group
pub struct Partitioner {
    membership: Arc<dyn GroupMembership>,
    group: String,
    member: String,
    ring: HashRing,
}

impl Partitioner {
    /// Join `group` as `member` and load the current membership
    pub async fn join(
        membership: Arc<dyn GroupMembership>,
        group: impl Into<String>,
        member: impl Into<String>,
    ) -> CoordinationResult<Self> {
        let group = group.into();
        let member = member.into();
        membership.join_group(&group, &member).await?;

        let mut partitioner = Self {
            membership,
            group,
            member,
            ring: HashRing::default(),
        };
        partitioner.refresh().await?;
        Ok(partitioner)
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn ring(&self) -> &HashRing {
        &self.ring
    }

    /// Reload the membership; returns whether it changed
    pub async fn refresh(&mut self) -> CoordinationResult<bool> {
        let ring = HashRing::new(self.membership.members(&self.group).await?);
        if ring == self.ring {
            return Ok(false);
        }
        tracing::debug!(
            group = %self.group,
            members = ring.nodes().len(),
            "Group membership changed"
        );
        self.ring = ring;
        Ok(true)
    }

    pub fn belongs_to_self(&self, item: &[u8], replicas: usize) -> bool {
        self.ring
            .get_nodes(item, replicas)
            .contains(&self.member.as_str())
    }

    pub async fn leave(&self) -> CoordinationResult<()> {
        self.membership.leave_group(&self.group, &self.member).await
    }
}
