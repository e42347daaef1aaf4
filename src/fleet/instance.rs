//! Instance abstraction.
//!
//! # Responsibilities
//! - Represent a single compute instance
//! - Track lifecycle state (Provisioning/Running/Draining/Terminated)
//! - Track health state and probe streaks (Unknown/Healthy/Unhealthy)
//! - Track active connections (for drain and Least Connections)
//!
//! # Design Decisions
//! - Lifecycle state is written only by the fleet controller
//! - Health state is written only by the health probe
//! - Both are atomics so pool reads never take a lock

use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use uuid::Uuid;

/// Lifecycle state enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Provisioning = 0,
    Running = 1,
    Draining = 2,
    Terminated = 3,
}

impl From<u8> for InstanceState {
    fn from(val: u8) -> Self {
        match val {
            1 => InstanceState::Running,
            2 => InstanceState::Draining,
            3 => InstanceState::Terminated,
            _ => InstanceState::Provisioning,
        }
    }
}

/// Health state enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

/// A single compute instance.
#[derive(Debug)]
pub struct Instance {
    /// Stable identity.
    pub id: Uuid,
    /// Service address.
    pub addr: SocketAddr,
    /// Admission order; higher means more recently added.
    pub seq: u64,

    /// Current lifecycle state (see InstanceState).
    state: AtomicU8,
    /// Current health state (see HealthState).
    health: AtomicU8,
    /// Consecutive probe failure count.
    consecutive_failures: AtomicU32,
    /// Consecutive probe success count.
    consecutive_successes: AtomicU32,
    /// Number of currently active connections.
    pub active_connections: AtomicUsize,
}

impl Instance {
    /// Create a new instance in the Provisioning state.
    pub fn new(addr: SocketAddr, seq: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            addr,
            seq,
            state: AtomicU8::new(InstanceState::Provisioning as u8),
            health: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
            active_connections: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> InstanceState {
        self.state.load(Ordering::Relaxed).into()
    }

    /// Transition the lifecycle state. Controller-only.
    pub fn set_state(&self, state: InstanceState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    pub fn health(&self) -> HealthState {
        self.health.load(Ordering::Relaxed).into()
    }

    /// Eligible for traffic iff Running and Healthy. Draining and
    /// Provisioning instances never qualify, nor do probe-pending ones.
    pub fn is_eligible(&self) -> bool {
        self.state() == InstanceState::Running && self.health() == HealthState::Healthy
    }

    /// Whether this instance's samples count toward the scale aggregate.
    /// Matches traffic eligibility: unhealthy capacity is not capacity.
    pub fn counts_toward_aggregate(&self) -> bool {
        self.is_eligible()
    }

    /// Whether this instance counts toward fleet capacity for bounds
    /// purposes. Draining instances are already on their way out.
    pub fn counts_toward_capacity(&self) -> bool {
        matches!(
            self.state(),
            InstanceState::Provisioning | InstanceState::Running
        )
    }

    pub fn in_flight(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Report a successful probe. Returns the new health state if this
    /// report caused a transition.
    pub fn mark_success(&self, healthy_threshold: u32) -> Option<HealthState> {
        self.consecutive_failures.store(0, Ordering::Relaxed);

        if self.health() == HealthState::Healthy {
            return None;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= healthy_threshold {
            self.health.store(HealthState::Healthy as u8, Ordering::Relaxed);
            self.consecutive_successes.store(0, Ordering::Relaxed);
            return Some(HealthState::Healthy);
        }
        None
    }

    /// Report a failed probe. Returns the new health state if this report
    /// caused a transition.
    pub fn mark_failure(&self, unhealthy_threshold: u32) -> Option<HealthState> {
        self.consecutive_successes.store(0, Ordering::Relaxed);

        if self.health() == HealthState::Unhealthy {
            return None;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= unhealthy_threshold {
            self.health.store(HealthState::Unhealthy as u8, Ordering::Relaxed);
            self.consecutive_failures.store(0, Ordering::Relaxed);
            return Some(HealthState::Unhealthy);
        }
        None
    }

    /// Create a guard tracking one in-flight request.
    pub fn acquire(self: &Arc<Self>) -> ConnectionGuard {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            instance: self.clone(),
        }
    }
}

/// A RAII guard that manages the active connection count. Work already
/// routed to an instance finishes even if the instance loses eligibility
/// mid-flight; the drain wait watches this count reach zero.
#[derive(Debug)]
pub struct ConnectionGuard {
    instance: Arc<Instance>,
}

impl Deref for ConnectionGuard {
    type Target = Instance;
    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.instance
            .active_connections
            .fetch_sub(1, Ordering::Relaxed);
    }
}

/// The live roster: every non-terminated instance, newest snapshot behind
/// arc-swap so readers (engine, probe, admin) never block the controller.
///
/// Mutation is single-writer: only the fleet controller, under its own
/// mutation lease, calls `add`/`remove`.
#[derive(Debug, Default)]
pub struct FleetRoster {
    instances: ArcSwap<Vec<Arc<Instance>>>,
    next_seq: std::sync::atomic::AtomicU64,
}

impl FleetRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<Instance>>> {
        self.instances.load_full()
    }

    pub fn alloc_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn add(&self, instance: Arc<Instance>) {
        let current = self.instances.load();
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(instance);
        self.instances.store(Arc::new(next));
    }

    pub fn remove(&self, id: Uuid) {
        let current = self.instances.load();
        let next: Vec<_> = current.iter().filter(|i| i.id != id).cloned().collect();
        self.instances.store(Arc::new(next));
    }

    /// Fleet capacity for bounds purposes (Provisioning + Running).
    pub fn capacity(&self) -> u32 {
        self.instances
            .load()
            .iter()
            .filter(|i| i.counts_toward_capacity())
            .count() as u32
    }

    /// Running instances only.
    pub fn running(&self) -> Vec<Arc<Instance>> {
        self.instances
            .load()
            .iter()
            .filter(|i| i.state() == InstanceState::Running)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance() -> Arc<Instance> {
        Arc::new(Instance::new("127.0.0.1:8080".parse().unwrap(), 0))
    }

    #[test]
    fn new_instance_is_provisioning_and_unknown() {
        let inst = instance();
        assert_eq!(inst.state(), InstanceState::Provisioning);
        assert_eq!(inst.health(), HealthState::Unknown);
        assert!(!inst.is_eligible());
    }

    #[test]
    fn eligibility_requires_running_and_healthy() {
        let inst = instance();
        inst.set_state(InstanceState::Running);
        assert!(!inst.is_eligible()); // still Unknown

        inst.mark_success(2);
        assert!(!inst.is_eligible()); // one success, threshold two
        inst.mark_success(2);
        assert!(inst.is_eligible());

        inst.set_state(InstanceState::Draining);
        assert!(!inst.is_eligible());
    }

    #[test]
    fn unhealthy_after_threshold_failures() {
        let inst = instance();
        inst.set_state(InstanceState::Running);

        assert_eq!(inst.mark_failure(3), None);
        assert_eq!(inst.mark_failure(3), None);
        assert_eq!(inst.mark_failure(3), Some(HealthState::Unhealthy));
        // Further failures are not transitions.
        assert_eq!(inst.mark_failure(3), None);
    }

    #[test]
    fn success_resets_failure_streak() {
        let inst = instance();
        inst.set_state(InstanceState::Running);

        inst.mark_failure(3);
        inst.mark_failure(3);
        inst.mark_success(2); // streak broken
        inst.mark_failure(3);
        inst.mark_failure(3);
        assert_eq!(inst.health(), HealthState::Unknown);
        assert_eq!(inst.mark_failure(3), Some(HealthState::Unhealthy));
    }

    #[test]
    fn recovery_needs_consecutive_successes() {
        let inst = instance();
        inst.set_state(InstanceState::Running);
        for _ in 0..3 {
            inst.mark_failure(3);
        }
        assert_eq!(inst.health(), HealthState::Unhealthy);

        inst.mark_success(2);
        assert_eq!(inst.health(), HealthState::Unhealthy);
        assert_eq!(inst.mark_success(2), Some(HealthState::Healthy));
    }

    #[test]
    fn guard_tracks_in_flight() {
        let inst = instance();
        {
            let _g1 = inst.acquire();
            let _g2 = inst.acquire();
            assert_eq!(inst.in_flight(), 2);
        }
        assert_eq!(inst.in_flight(), 0);
    }

    #[test]
    fn roster_capacity_ignores_draining() {
        let roster = FleetRoster::new();
        let a = instance();
        let b = instance();
        a.set_state(InstanceState::Running);
        b.set_state(InstanceState::Draining);
        roster.add(a.clone());
        roster.add(b);
        assert_eq!(roster.capacity(), 1);
        assert_eq!(roster.running().len(), 1);

        roster.remove(a.id);
        assert_eq!(roster.capacity(), 0);
    }
}
