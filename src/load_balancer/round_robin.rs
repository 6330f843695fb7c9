//! Round-robin load balancing strategy.

use std::sync::Arc;
use crate::cluster::destination::Destination;
use crate::cluster::Cluster;
use crate::load_balancer::LoadBalancer;

/// Round-robin selector.
/// Rotates through candidates using the cluster's own counter, so clusters
/// sharing this instance do not disturb each other's rotation.
#[derive(Debug, Default)]
pub struct RoundRobin;

impl RoundRobin {
    pub const NAME: &'static str = "RoundRobin";

    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for RoundRobin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn pick(&self, cluster: &Cluster, candidates: &[Arc<Destination>]) -> Option<Arc<Destination>> {
        if candidates.is_empty() {
            return None;
        }
        let index = cluster.next_round_robin() % candidates.len();
        Some(candidates[index].clone())
    }
}
