//! Round-robin distribution strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::fleet::instance::Instance;
use crate::pool::LoadBalancer;

/// Round-robin selector.
/// Stores an internal counter to rotate through the eligible set.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_member(&self, eligible: &[Arc<Instance>]) -> Option<Arc<Instance>> {
        if eligible.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % eligible.len();
        Some(eligible[index].clone())
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
        assert_eq!(inst.health(), HealthState::Healthy);
        inst
    }

    #[test]
    fn rotates_deterministically() {
        let lb = RoundRobin::new();
        let members = vec![running(8080), running(8081)];

        let s1 = lb.next_member(&members).unwrap();
        assert_eq!(s1.addr, members[0].addr);

        let s2 = lb.next_member(&members).unwrap();
        assert_eq!(s2.addr, members[1].addr);

        let s3 = lb.next_member(&members).unwrap();
        assert_eq!(s3.addr, members[0].addr);
    }

    #[test]
    fn empty_set_yields_none() {
        let lb = RoundRobin::new();
        assert!(lb.next_member(&[]).is_none());
    }
}
