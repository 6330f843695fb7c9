//! Destination abstraction.
//!
//! # Responsibilities
//! - Represent a single backend endpoint of a cluster
//! - Track concurrent requests (for least-requests balancing)
//! - Hold the health record written by active/passive checks
//!
//! # Design Decisions
//! - Identity (`id`) is fixed for the lifetime of the value
//! - Address config and health are published through `ArcSwap`: readers
//!   never lock, writers replace the whole record
//! - Requests hold an `Arc<Destination>`; removal from the registry does
//!   not invalidate it

use arc_swap::ArcSwap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

use crate::health::state::{DestinationHealth, HealthState};

/// Addresses of a destination, swappable on reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationConfig {
    /// Address requests are forwarded to.
    pub address: Url,
    /// Address active probes go to, when different from `address`.
    pub probe_address: Option<Url>,
}

impl DestinationConfig {
    pub fn new(address: Url) -> Self {
        Self {
            address,
            probe_address: None,
        }
    }

    /// Probe address, defaulting to the forwarding address.
    pub fn probe_address(&self) -> &Url {
        self.probe_address.as_ref().unwrap_or(&self.address)
    }
}

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// A single backend endpoint.
#[derive(Debug)]
pub struct Destination {
    id: String,
    instance: u64,
    config: ArcSwap<DestinationConfig>,
    health: ArcSwap<DestinationHealth>,
    /// Number of requests currently in flight to this destination.
    concurrent_requests: AtomicUsize,
}

impl Destination {
    /// Create a new destination with unknown health.
    pub fn new(id: impl Into<String>, config: DestinationConfig) -> Self {
        Self {
            id: id.into(),
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            config: ArcSwap::from_pointee(config),
            health: ArcSwap::from_pointee(DestinationHealth::default()),
            concurrent_requests: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Process-unique number of this instance. A destination removed and
    /// re-created under the same id gets a new one.
    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// Current address snapshot.
    pub fn config(&self) -> Arc<DestinationConfig> {
        self.config.load_full()
    }

    /// Publish new addresses, keeping identity and health.
    pub fn set_config(&self, config: DestinationConfig) {
        self.config.store(Arc::new(config));
    }

    // --- Health ---

    pub fn health(&self) -> DestinationHealth {
        **self.health.load()
    }

    /// Replace the active sub-state; returns the previous record.
    pub fn set_active_health(&self, state: HealthState) -> DestinationHealth {
        *self.health.rcu(|current| current.with_active(state))
    }

    /// Replace the passive sub-state; returns the previous record.
    pub fn set_passive_health(&self, state: HealthState) -> DestinationHealth {
        *self.health.rcu(|current| current.with_passive(state))
    }

    /// Return true if the destination may receive traffic.
    pub fn is_available(&self) -> bool {
        self.health().is_available()
    }

    // --- Concurrency tracking ---

    pub fn concurrent_requests(&self) -> usize {
        self.concurrent_requests.load(Ordering::Relaxed)
    }

    /// Start tracking a request; the count drops when the lease does.
    pub fn lease(self: &Arc<Self>) -> DestinationLease {
        self.concurrent_requests.fetch_add(1, Ordering::Relaxed);
        DestinationLease {
            destination: self.clone(),
        }
    }
}

/// A RAII guard that counts a request against its destination.
#[derive(Debug)]
pub struct DestinationLease {
    destination: Arc<Destination>,
}

impl DestinationLease {
    pub fn destination(&self) -> &Arc<Destination> {
        &self.destination
    }
}

impl Deref for DestinationLease {
    type Target = Destination;
    fn deref(&self) -> &Self::Target {
        &self.destination
    }
}

impl Drop for DestinationLease {
    fn drop(&mut self) {
        self.destination.concurrent_requests.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destination() -> Arc<Destination> {
        let address = Url::parse("http://127.0.0.1:8080/").unwrap();
        Arc::new(Destination::new("d1", DestinationConfig::new(address)))
    }

    #[test]
    fn test_probe_address_defaults_to_address() {
        let d = destination();
        assert_eq!(d.config().probe_address().as_str(), "http://127.0.0.1:8080/");

        let mut config = (*d.config()).clone();
        config.probe_address = Some(Url::parse("http://127.0.0.1:9090/").unwrap());
        d.set_config(config);
        assert_eq!(d.config().probe_address().as_str(), "http://127.0.0.1:9090/");
        assert_eq!(d.config().address.as_str(), "http://127.0.0.1:8080/");
    }

    #[test]
    fn test_instances_are_unique_per_id() {
        let a = destination();
        let b = destination();
        assert_eq!(a.id(), b.id());
        assert_ne!(a.instance(), b.instance());
    }

    #[test]
    fn test_health_writes_keep_other_substate() {
        let d = destination();
        let previous = d.set_passive_health(HealthState::Healthy);
        assert_eq!(previous, DestinationHealth::default());

        d.set_active_health(HealthState::Unhealthy);
        assert_eq!(
            d.health(),
            DestinationHealth {
                active: HealthState::Unhealthy,
                passive: HealthState::Healthy,
            }
        );
        assert!(!d.is_available());
    }

    #[test]
    fn test_lease_counts_requests() {
        let d = destination();
        let first = d.lease();
        let second = d.lease();
        assert_eq!(d.concurrent_requests(), 2);
        drop(first);
        assert_eq!(second.concurrent_requests(), 1);
        drop(second);
        assert_eq!(d.concurrent_requests(), 0);
    }

    #[test]
    fn test_concurrent_active_writes_are_not_lost() {
        let d = destination();
        d.set_passive_health(HealthState::Healthy);
        std::thread::scope(|s| {
            for i in 0..8 {
                let d = &d;
                s.spawn(move || {
                    for _ in 0..100 {
                        let state = if i % 2 == 0 { HealthState::Healthy } else { HealthState::Unhealthy };
                        d.set_active_health(state);
                    }
                });
            }
        });
        // Active writes never clobber the passive sub-state.
        assert_eq!(d.health().passive, HealthState::Healthy);
    }
}
