//! Trivial strategies: first candidate, uniform random.

use std::sync::Arc;
use crate::cluster::destination::Destination;
use crate::cluster::Cluster;
use crate::load_balancer::LoadBalancer;

#[derive(Debug, Default)]
pub struct First;

impl First {
    pub const NAME: &'static str = "First";
}

impl LoadBalancer for First {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn pick(&self, _cluster: &Cluster, candidates: &[Arc<Destination>]) -> Option<Arc<Destination>> {
        candidates.first().cloned()
    }
}

#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub const NAME: &'static str = "Random";
}

impl LoadBalancer for Random {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn pick(&self, _cluster: &Cluster, candidates: &[Arc<Destination>]) -> Option<Arc<Destination>> {
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[fastrand::usize(..candidates.len())].clone())
    }
}
