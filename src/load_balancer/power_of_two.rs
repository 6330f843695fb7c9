//! Power-of-two-choices load balancing strategy.

use std::sync::Arc;
use crate::cluster::destination::Destination;
use crate::cluster::Cluster;
use crate::load_balancer::LoadBalancer;

/// Picks two distinct candidates at random and keeps the less loaded one.
#[derive(Debug, Default)]
pub struct PowerOfTwoChoices;

impl PowerOfTwoChoices {
    pub const NAME: &'static str = "PowerOfTwoChoices";
}

impl LoadBalancer for PowerOfTwoChoices {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn pick(&self, _cluster: &Cluster, candidates: &[Arc<Destination>]) -> Option<Arc<Destination>> {
        match candidates.len() {
            0 => None,
            1 => Some(candidates[0].clone()),
            len => {
                let first = fastrand::usize(..len);
                let mut second = fastrand::usize(..len - 1);
                if second >= first {
                    second += 1;
                }
                let (a, b) = (&candidates[first], &candidates[second]);
                let winner = if b.concurrent_requests() < a.concurrent_requests() { b } else { a };
                Some(winner.clone())
            }
        }
    }
}
