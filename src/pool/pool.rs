//! Backend pool management.
//!
//! # Responsibilities
//! - Maintain the registered membership set (lock-free snapshot)
//! - Derive the eligible set and apply the distribution strategy
//! - Provide connection guards for in-flight tracking
//!
//! Registration is single-writer: only the fleet controller registers and
//! deregisters, serialized by its mutation lease. Health updates never touch
//! the membership vector, so routing reads race with nothing.

use std::sync::Arc;

use arc_swap::ArcSwap;
use uuid::Uuid;

use crate::config::schema::StrategyKind;
use crate::fleet::instance::{ConnectionGuard, Instance};
use crate::observability::metrics;
use crate::pool::least_conn::LeastConnections;
use crate::pool::round_robin::RoundRobin;
use crate::pool::LoadBalancer;

/// The set of instances currently registered for traffic.
#[derive(Debug)]
pub struct BackendPool {
    members: ArcSwap<Vec<Arc<Instance>>>,
    strategy: Box<dyn LoadBalancer>,
}

impl BackendPool {
    pub fn new(strategy: StrategyKind) -> Self {
        let strategy: Box<dyn LoadBalancer> = match strategy {
            StrategyKind::RoundRobin => Box::new(RoundRobin::new()),
            StrategyKind::LeastConnections => Box::new(LeastConnections::new()),
        };
        Self {
            members: ArcSwap::from_pointee(Vec::new()),
            strategy,
        }
    }

    /// Register an instance for traffic. Eligibility still requires the
    /// instance to be Running and Healthy; registration alone routes
    /// nothing.
    pub fn register(&self, instance: Arc<Instance>) {
        let current = self.members.load();
        if current.iter().any(|i| i.id == instance.id) {
            return;
        }
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(instance.clone());
        self.members.store(Arc::new(next));

        tracing::info!(instance = %instance.id, addr = %instance.addr, "Backend registered");
        metrics::record_eligible_backends(self.eligible().len());
    }

    /// Remove an instance from membership. New routing decisions stop
    /// immediately; requests already guarded complete on their own.
    pub fn deregister(&self, id: Uuid) {
        let current = self.members.load();
        if !current.iter().any(|i| i.id == id) {
            return;
        }
        let next: Vec<_> = current.iter().filter(|i| i.id != id).cloned().collect();
        self.members.store(Arc::new(next));

        tracing::info!(instance = %id, "Backend deregistered");
        metrics::record_eligible_backends(self.eligible().len());
    }

    /// All registered members.
    pub fn members(&self) -> Arc<Vec<Arc<Instance>>> {
        self.members.load_full()
    }

    /// The current eligible set: Running AND Healthy.
    pub fn eligible(&self) -> Vec<Arc<Instance>> {
        self.members
            .load()
            .iter()
            .filter(|i| i.is_eligible())
            .cloned()
            .collect()
    }

    /// Route one request: pick an eligible member and return a guard that
    /// tracks it in-flight until dropped.
    pub fn select(&self) -> Option<ConnectionGuard> {
        let eligible = self.eligible();
        let member = self.strategy.next_member(&eligible)?;
        Some(member.acquire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::instance::{HealthState, InstanceState};

    fn running(port: u16) -> Arc<Instance> {
        let inst = Arc::new(Instance::new(
            format!("127.0.0.1:{}", port).parse().unwrap(),
            port as u64,
        ));
        inst.set_state(InstanceState::Running);
        inst.mark_success(1);
        inst
    }

    #[test]
    fn select_skips_ineligible_members() {
        let pool = BackendPool::new(StrategyKind::RoundRobin);
        let healthy = running(8080);
        let sick = running(8081);
        pool.register(healthy.clone());
        pool.register(sick.clone());

        sick.mark_failure(1);
        assert_eq!(sick.health(), HealthState::Unhealthy);

        for _ in 0..10 {
            let guard = pool.select().unwrap();
            assert_eq!(guard.addr, healthy.addr);
        }
    }

    #[test]
    fn deregister_stops_new_traffic_but_keeps_in_flight() {
        let pool = BackendPool::new(StrategyKind::RoundRobin);
        let inst = running(8080);
        pool.register(inst.clone());

        let guard = pool.select().unwrap();
        pool.deregister(inst.id);

        // No new selections.
        assert!(pool.select().is_none());
        // The in-flight request still counts until the guard drops.
        assert_eq!(inst.in_flight(), 1);
        drop(guard);
        assert_eq!(inst.in_flight(), 0);
    }

    #[test]
    fn double_register_is_a_no_op() {
        let pool = BackendPool::new(StrategyKind::RoundRobin);
        let inst = running(8080);
        pool.register(inst.clone());
        pool.register(inst);
        assert_eq!(pool.members().len(), 1);
    }

    #[test]
    fn draining_member_is_not_eligible() {
        let pool = BackendPool::new(StrategyKind::RoundRobin);
        let inst = running(8080);
        pool.register(inst.clone());
        assert_eq!(pool.eligible().len(), 1);

        inst.set_state(InstanceState::Draining);
        assert!(pool.eligible().is_empty());
        assert!(pool.select().is_none());
    }
}
