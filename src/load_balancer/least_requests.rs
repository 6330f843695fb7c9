//! Least Requests load balancing strategy.

use std::sync::Arc;
use crate::cluster::destination::Destination;
use crate::cluster::Cluster;
use crate::load_balancer::LoadBalancer;

/// Least requests selector.
/// Selects the destination with the fewest in-flight requests.
#[derive(Debug, Default)]
pub struct LeastRequests;

impl LeastRequests {
    pub const NAME: &'static str = "LeastRequests";

    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastRequests {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn pick(&self, _cluster: &Cluster, candidates: &[Arc<Destination>]) -> Option<Arc<Destination>> {
        // In case of tie, the first one is selected (stability)
        candidates
            .iter()
            .min_by_key(|d| d.concurrent_requests())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::destination::DestinationConfig;
    use crate::cluster::ClusterConfig;
    use crate::config::ClusterOptions;
    use url::Url;

    #[test]
    fn test_least_requests() {
        let lb = LeastRequests::new();
        let cluster = Cluster::with_config(ClusterConfig::for_tests(ClusterOptions::new("c")));
        let address = Url::parse("http://127.0.0.1:8080/").unwrap();
        let d1 = Arc::new(Destination::new("d1", DestinationConfig::new(address.clone())));
        let d2 = Arc::new(Destination::new("d2", DestinationConfig::new(address)));

        let _l1 = d1.lease();
        let destinations = vec![d1.clone(), d2.clone()];

        // Should pick d2 (0 requests)
        assert_eq!(lb.pick(&cluster, &destinations).unwrap().id(), "d2");

        let _l2 = d2.lease();
        let _l3 = d2.lease(); // now d2 has 2, d1 has 1

        assert_eq!(lb.pick(&cluster, &destinations).unwrap().id(), "d1");
    }
}
