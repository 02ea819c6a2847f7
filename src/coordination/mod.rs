//! Coordination between workers
//!
//! - **lock**: Named locks and the `LockGuard` that releases them on drop
//! - **partition**: Group membership and rendezvous-hash work assignment
//! - **local**: In-process implementation of both
//! - **file**: Lock files shared by every process on one data directory
//! - **error**: Error types

pub mod error;
pub mod file;
pub mod local;
pub mod lock;
pub mod partition;

pub use error::{CoordinationError, CoordinationResult};
pub use file::FileLockManager;
pub use local::LocalCoordinator;
pub use lock::{metric_lock_name, LockGuard, LockManager};
pub use partition::{GroupMembership, HashRing, Partitioner};
