//! Least Connections distribution strategy.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::fleet::instance::Instance;
use crate::pool::LoadBalancer;

/// Least connections selector.
/// Selects the member with the minimum number of active connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for LeastConnections {
    fn next_member(&self, eligible: &[Arc<Instance>]) -> Option<Arc<Instance>> {
        if eligible.is_empty() {
            return None;
        }

        // In case of tie, the first one is selected (stability)
        eligible
            .iter()
            .min_by_key(|i| i.active_connections.load(Ordering::Relaxed))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::instance::InstanceState;

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
    fn picks_fewest_connections() {
        let lb = LeastConnections::new();
        let a = running(8080);
        let b = running(8081);

        // artificially load a
        let _g = a.acquire();

        let members = vec![a.clone(), b.clone()];

        let s1 = lb.next_member(&members).unwrap();
        assert_eq!(s1.addr, b.addr);

        // now load b past a
        let _g2 = b.acquire();
        let _g3 = b.acquire();

        let s2 = lb.next_member(&members).unwrap();
        assert_eq!(s2.addr, a.addr);
    }
}
