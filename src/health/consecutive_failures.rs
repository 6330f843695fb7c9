//! Consecutive-failures health policy.
//!
//! # State Transitions
//! ```text
//! 2xx response         → Healthy, counter reset
//! other status / error → counter + 1
//!                        counter >= threshold → Unhealthy
//!                        otherwise            → unchanged
//! ```
//!
//! The threshold comes from cluster metadata
//! `ConsecutiveFailuresHealthPolicy.Threshold` (default 3).
//!
//! Counters are keyed by destination instance, so a destination re-created
//! under an old id starts from zero. Entries are dropped when the cluster
//! reports the destination removed.

use dashmap::DashMap;

use crate::cluster::destination::Destination;
use crate::cluster::ClusterConfig;
use crate::health::policy::ActiveHealthCheckPolicy;
use crate::health::probe::ProbeOutcome;
use crate::health::state::HealthState;
use crate::observability::metrics;

pub const THRESHOLD_METADATA_KEY: &str = "ConsecutiveFailuresHealthPolicy.Threshold";
const DEFAULT_THRESHOLD: u32 = 3;

#[derive(Debug, Default)]
pub struct ConsecutiveFailuresPolicy {
    /// Destination instance -> consecutive failures.
    failures: DashMap<u64, u32>,
}

impl ConsecutiveFailuresPolicy {
    pub const NAME: &'static str = "ConsecutiveFailures";

    pub fn new() -> Self {
        Self::default()
    }

    fn threshold(cluster: &ClusterConfig) -> u32 {
        cluster
            .options()
            .metadata
            .get(THRESHOLD_METADATA_KEY)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|t| *t > 0)
            .unwrap_or(DEFAULT_THRESHOLD)
    }
}

impl ActiveHealthCheckPolicy for ConsecutiveFailuresPolicy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn probing_completed(&self, cluster: &ClusterConfig, destination: &Destination, outcome: &ProbeOutcome) {
        let success = matches!(outcome, Ok(response) if response.status().is_success());
        // The entry guard serializes updates for this destination.
        let mut failures = self.failures.entry(destination.instance()).or_insert(0);
        let new_state = if success {
            *failures = 0;
            Some(HealthState::Healthy)
        } else {
            *failures = failures.saturating_add(1);
            (*failures >= Self::threshold(cluster)).then_some(HealthState::Unhealthy)
        };

        let Some(new_state) = new_state else {
            tracing::debug!(
                cluster = %cluster.id(),
                destination = %destination.id(),
                failures = *failures,
                "Probe failed, below threshold"
            );
            return;
        };

        let previous = destination.set_active_health(new_state);
        drop(failures);

        if previous.active != new_state {
            tracing::info!(
                cluster = %cluster.id(),
                destination = %destination.id(),
                from = ?previous.active,
                to = ?new_state,
                "Active health changed"
            );
        }
        metrics::record_destination_health(cluster.id(), destination.id(), new_state);
    }

    fn destination_removed(&self, destination: &Destination) {
        self.failures.remove(&destination.instance());
    }
}
