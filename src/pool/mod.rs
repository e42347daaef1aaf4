//! Backend pool subsystem.
//!
//! # Data Flow
//! ```text
//! Routing decision
//!     → pool.rs (snapshot registered members, filter eligible)
//!     → Apply distribution strategy:
//!         - round_robin.rs (rotate through eligible set, default)
//!         - least_conn.rs (pick member with fewest connections)
//!     → ConnectionGuard (in-flight tracked until drop)
//! ```
//!
//! # Design Decisions
//! - Membership reads are lock-free snapshots; routing never blocks on a
//!   concurrent health update
//! - Eligibility is derived per read: Running AND Healthy (Draining is a
//!   distinct lifecycle state and so never eligible)
//! - Strategies are stateless over the eligible slice; round-robin keeps
//!   only a rotation counter, so selection is deterministic for a fixed
//!   eligible set

pub mod least_conn;
pub mod pool;
pub mod round_robin;

use std::sync::Arc;

use crate::fleet::instance::Instance;

/// Distribution strategy over the eligible set.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick the next member from the eligible slice.
    fn next_member(&self, eligible: &[Arc<Instance>]) -> Option<Arc<Instance>>;
}

pub use pool::BackendPool;
