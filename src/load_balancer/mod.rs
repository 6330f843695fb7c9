//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Cluster chosen by the (external) router
//!     → registry snapshot of destinations
//!     → available subset (effective health != Unhealthy)
//!     → session affinity lookup (may narrow the set)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through destinations)
//!         - least_requests.rs (fewest in-flight requests)
//!         - power_of_two.rs (best of two random picks)
//!         - simple.rs (first, random)
//!     → affinitize response, lease destination
//! ```
//!
//! # Design Decisions
//! - Algorithms are stateless apart from per-cluster counters on `Cluster`
//! - Algorithm selection per cluster, resolved by name at config load
//! - Affinity never turns into a routing failure: any miss falls back to
//!   the full available set

pub mod least_requests;
pub mod power_of_two;
pub mod round_robin;
pub mod simple;

use axum::http::HeaderMap;
use std::sync::Arc;

use crate::cluster::destination::{Destination, DestinationLease};
use crate::cluster::Cluster;

pub use least_requests::LeastRequests;
pub use power_of_two::PowerOfTwoChoices;
pub use round_robin::RoundRobin;
pub use simple::{First, Random};

/// Selects one destination from a non-empty candidate set.
pub trait LoadBalancer: Send + Sync {
    /// Name referenced by `load_balancing_policy`.
    fn name(&self) -> &str;

    fn pick(&self, cluster: &Cluster, candidates: &[Arc<Destination>]) -> Option<Arc<Destination>>;
}

/// Choose a destination for one request and record affinity for it.
///
/// Returns `None` only when the cluster has no available destination.
pub fn pick_destination(
    cluster: &Cluster,
    request: &HeaderMap,
    response: &mut HeaderMap,
) -> Option<DestinationLease> {
    let config = cluster.config();
    let all = cluster.destinations().snapshot();
    let available: Vec<Arc<Destination>> = all.iter().filter(|d| d.is_available()).cloned().collect();
    if available.is_empty() {
        tracing::debug!(cluster = %cluster.id(), total = all.len(), "No available destinations");
        return None;
    }

    let affinity = config.session_affinity();
    let mut candidates = available;
    if let Some(provider) = affinity {
        let options = &config.options().session_affinity;
        let result = provider.try_find_affinitized_destinations(request, &all, cluster.id(), options);
        if result.found() {
            candidates = result.destinations;
        } else {
            tracing::trace!(cluster = %cluster.id(), status = ?result.status, "Affinity miss, balancing over all");
        }
    }

    let chosen = config.load_balancer().pick(cluster, &candidates)?;
    if let Some(provider) = affinity {
        provider.affinitize_request(response, &config.options().session_affinity, &chosen);
    }
    Some(chosen.lease())
}
