//! Health check policy contract.
//!
//! A policy turns one probe outcome into an active health transition for
//! one destination. Policies are registered by name and referenced from
//! cluster config; the monitor calls them from the probe task of the
//! destination concerned, so a policy sees at most one concurrent call per
//! destination per cycle.

use crate::cluster::destination::Destination;
use crate::cluster::ClusterConfig;
use crate::health::probe::ProbeOutcome;

pub trait ActiveHealthCheckPolicy: Send + Sync {
    /// Name referenced by `health_check.active.policy`.
    fn name(&self) -> &str;

    /// Interpret a probe outcome and update `destination`'s active health.
    ///
    /// Panics are not caught: they indicate a broken policy, not a sick
    /// backend.
    fn probing_completed(&self, cluster: &ClusterConfig, destination: &Destination, outcome: &ProbeOutcome);

    /// `destination` left its cluster, or its cluster stopped using this
    /// policy. Drop whatever was kept for it.
    fn destination_removed(&self, _destination: &Destination) {}
}
