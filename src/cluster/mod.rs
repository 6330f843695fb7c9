//! Cluster runtime model.
//!
//! # Data Flow
//! ```text
//! ClusterOptions (validated config)
//!     → ClusterConfig::resolve (extension lookup, transport)
//!     → Cluster (ArcSwap<ClusterConfig> + DestinationRegistry)
//!     → manager.rs publishes Arc<Cluster> to readers and listeners
//!
//! Request path (lock-free):
//!     cluster.config()                  → Arc<ClusterConfig>
//!     cluster.destinations().snapshot() → Arc<Vec<Arc<Destination>>>
//! ```
//!
//! # Design Decisions
//! - The config snapshot is replaced wholesale; readers see old or new,
//!   never a mix
//! - Extension names are resolved once per snapshot and cached on it
//! - A snapshot that failed to resolve an extension is still published,
//!   with that subsystem inert

pub mod destination;
pub mod error;
pub mod extensions;
pub mod manager;
pub mod registry;
pub mod transport;

use arc_swap::ArcSwap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

use crate::affinity::SessionAffinityProvider;
use crate::config::{ClusterOptions, DestinationOptions};
use crate::health::policy::ActiveHealthCheckPolicy;
use crate::load_balancer::{LoadBalancer, PowerOfTwoChoices};

pub use destination::{Destination, DestinationConfig, DestinationLease};
pub use error::ConfigurationError;
pub use extensions::Extensions;
pub use manager::{ClusterChangeListener, ClusterManager, ReloadSummary};
pub use registry::{DestinationRegistry, DestinationSnapshot};
pub use transport::{build_transport, HttpTransport};

/// Immutable configuration snapshot of one cluster.
pub struct ClusterConfig {
    options: ClusterOptions,
    transport: HttpTransport,
    health_check_policy: Option<Arc<dyn ActiveHealthCheckPolicy>>,
    session_affinity: Option<Arc<dyn SessionAffinityProvider>>,
    load_balancer: Arc<dyn LoadBalancer>,
}

impl ClusterConfig {
    /// Resolve extension names and bind the outbound transport.
    ///
    /// `transport` is reused when given, otherwise a new one is built from
    /// `options.http_client`. Unresolvable names are reported and leave the
    /// corresponding subsystem disabled.
    pub fn resolve(
        options: ClusterOptions,
        extensions: &Extensions,
        transport: Option<HttpTransport>,
    ) -> (Self, Vec<ConfigurationError>) {
        let mut errors = Vec::new();

        let active = &options.health_check.active;
        let health_check_policy = if active.enabled {
            let policy = extensions.health_check_policy(&active.policy);
            if policy.is_none() {
                errors.push(ConfigurationError::UnknownHealthCheckPolicy {
                    cluster: options.id.clone(),
                    policy: active.policy.clone(),
                });
            }
            policy
        } else {
            None
        };

        let affinity = &options.session_affinity;
        let session_affinity = if affinity.enabled {
            let provider = extensions.affinity_provider(&affinity.mode);
            if provider.is_none() {
                errors.push(ConfigurationError::UnknownAffinityMode {
                    cluster: options.id.clone(),
                    mode: affinity.mode.clone(),
                });
            }
            provider
        } else {
            None
        };

        let load_balancer = match extensions.load_balancer(&options.load_balancing_policy) {
            Some(lb) => lb,
            None => {
                errors.push(ConfigurationError::UnknownLoadBalancingPolicy {
                    cluster: options.id.clone(),
                    policy: options.load_balancing_policy.clone(),
                    fallback: PowerOfTwoChoices::NAME,
                });
                extensions
                    .load_balancer(PowerOfTwoChoices::NAME)
                    .unwrap_or_else(|| Arc::new(PowerOfTwoChoices))
            }
        };

        let transport = transport.unwrap_or_else(|| build_transport(&options.http_client));

        let config = Self {
            options,
            transport,
            health_check_policy,
            session_affinity,
            load_balancer,
        };
        (config, errors)
    }

    #[cfg(test)]
    pub(crate) fn for_tests(options: ClusterOptions) -> Self {
        Self::resolve(options, &Extensions::with_defaults(), None).0
    }

    pub fn id(&self) -> &str {
        &self.options.id
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    /// Shared outbound client. Probes and forwarded traffic both use it.
    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    /// The policy to report probe outcomes to, if active checks are on.
    pub fn health_check_policy(&self) -> Option<&Arc<dyn ActiveHealthCheckPolicy>> {
        self.health_check_policy.as_ref()
    }

    /// Enabled in config and backed by a registered policy.
    pub fn active_health_checks_enabled(&self) -> bool {
        self.health_check_policy.is_some()
    }

    /// The affinity mode, if affinity is on and the mode is registered.
    pub fn session_affinity(&self) -> Option<&Arc<dyn SessionAffinityProvider>> {
        self.session_affinity.as_ref()
    }

    pub fn load_balancer(&self) -> &Arc<dyn LoadBalancer> {
        &self.load_balancer
    }
}

impl std::fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("options", &self.options)
            .field("health_check_policy", &self.health_check_policy.as_ref().map(|p| p.name().to_string()))
            .field("session_affinity", &self.session_affinity.as_ref().map(|p| p.mode().to_string()))
            .field("load_balancer", &self.load_balancer.name())
            .finish()
    }
}

/// A backend pool: current config snapshot plus live destinations.
pub struct Cluster {
    id: String,
    config: ArcSwap<ClusterConfig>,
    destinations: DestinationRegistry,
    round_robin: AtomicUsize,
}

impl Cluster {
    /// Create a cluster and its destinations from a resolved config.
    pub fn with_config(config: ClusterConfig) -> Arc<Self> {
        Self::create(config).0
    }

    pub(crate) fn create(config: ClusterConfig) -> (Arc<Self>, Vec<ConfigurationError>) {
        let cluster = Arc::new(Self {
            id: config.id().to_string(),
            config: ArcSwap::from_pointee(config),
            destinations: DestinationRegistry::new(),
            round_robin: AtomicUsize::new(0),
        });
        let errors = cluster.reconcile_destinations();
        (cluster, errors)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current config snapshot; callers may hold it as long as they like.
    pub fn config(&self) -> Arc<ClusterConfig> {
        self.config.load_full()
    }

    /// Publish a new config snapshot and reconcile destinations against it.
    ///
    /// A health check policy the new snapshot no longer uses is told to
    /// forget every destination of this cluster.
    pub fn update_config(&self, config: ClusterConfig) -> Vec<ConfigurationError> {
        debug_assert_eq!(config.id(), self.id);
        let previous = self.config.swap(Arc::new(config));
        if let Some(old_policy) = previous.health_check_policy() {
            let kept = self
                .config()
                .health_check_policy()
                .is_some_and(|policy| Arc::ptr_eq(policy, old_policy));
            if !kept {
                self.release_policy_state(old_policy);
            }
        }
        self.reconcile_destinations()
    }

    /// Tell the current policy to forget every destination. Called once the
    /// cluster has been removed.
    pub(crate) fn retire(&self) {
        if let Some(policy) = self.config().health_check_policy() {
            self.release_policy_state(policy);
        }
    }

    fn release_policy_state(&self, policy: &Arc<dyn ActiveHealthCheckPolicy>) {
        for destination in self.destinations.snapshot().iter() {
            policy.destination_removed(destination);
        }
    }

    pub fn destinations(&self) -> &DestinationRegistry {
        &self.destinations
    }

    /// Next value of this cluster's rotation counter.
    pub fn next_round_robin(&self) -> usize {
        self.round_robin.fetch_add(1, Ordering::Relaxed)
    }

    /// Diff the configured destination set against the registry by id.
    ///
    /// Persisting ids keep their instance (and health); only their
    /// addresses are refreshed.
    fn reconcile_destinations(&self) -> Vec<ConfigurationError> {
        let config = self.config();
        let mut errors = Vec::new();
        let mut wanted = HashSet::new();

        for options in &config.options().destinations {
            let Some(destination_config) = self.parse_destination(options, &mut errors) else {
                continue;
            };
            wanted.insert(options.id.as_str());

            match self.destinations.get(&options.id) {
                Some(existing) => {
                    if *existing.config() != destination_config {
                        existing.set_config(destination_config);
                    }
                }
                None => {
                    self.destinations.get_or_create(&options.id, move || destination_config);
                }
            }
        }

        for existing in self.destinations.snapshot().iter() {
            if wanted.contains(existing.id()) {
                continue;
            }
            if let Some(removed) = self.destinations.remove(existing.id()) {
                if let Some(policy) = config.health_check_policy() {
                    policy.destination_removed(&removed);
                }
            }
        }
        errors
    }

    fn parse_destination(
        &self,
        options: &DestinationOptions,
        errors: &mut Vec<ConfigurationError>,
    ) -> Option<DestinationConfig> {
        let parse = |address: &str| {
            Url::parse(address).map_err(|_| ConfigurationError::InvalidDestinationAddress {
                cluster: self.id.clone(),
                destination: options.id.clone(),
                address: address.to_string(),
            })
        };

        let result = parse(&options.address).and_then(|address| {
            let probe_address = options.probe_address.as_deref().map(parse).transpose()?;
            Ok(DestinationConfig { address, probe_address })
        });
        match result {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping destination");
                errors.push(e);
                None
            }
        }
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("id", &self.id)
            .field("destinations", &self.destinations.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::state::HealthState;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn options(id: &str, destinations: &[(&str, u16)]) -> ClusterOptions {
        let mut options = ClusterOptions::new(id);
        options.destinations = destinations
            .iter()
            .map(|(id, port)| DestinationOptions {
                id: id.to_string(),
                address: format!("http://127.0.0.1:{port}/"),
                probe_address: None,
            })
            .collect();
        options
    }

    #[test]
    fn test_unknown_extensions_disable_subsystems() {
        let mut opts = options("c1", &[]);
        opts.health_check.active.enabled = true;
        opts.health_check.active.policy = "Missing".into();
        opts.session_affinity.enabled = true;
        opts.session_affinity.mode = "Missing".into();
        opts.load_balancing_policy = "Missing".into();

        let (config, errors) = ClusterConfig::resolve(opts, &Extensions::with_defaults(), None);
        assert_eq!(errors.len(), 3);
        assert!(!config.active_health_checks_enabled());
        assert!(config.session_affinity().is_none());
        assert_eq!(config.load_balancer().name(), "PowerOfTwoChoices");
    }

    #[test]
    fn test_disabled_subsystems_are_not_resolved() {
        let mut opts = options("c1", &[]);
        opts.health_check.active.policy = "Missing".into();
        opts.session_affinity.mode = "Missing".into();

        let (config, errors) = ClusterConfig::resolve(opts, &Extensions::with_defaults(), None);
        assert!(errors.is_empty());
        assert!(config.health_check_policy().is_none());
    }

    #[test]
    fn test_reload_preserves_identity_and_health() {
        let cluster = Cluster::with_config(ClusterConfig::for_tests(options("c1", &[("a", 1), ("b", 2)])));
        let a = cluster.destinations().get("a").unwrap();
        a.set_active_health(HealthState::Unhealthy);

        let errors = cluster.update_config(ClusterConfig::for_tests(options("c1", &[("a", 9), ("c", 3)])));
        assert!(errors.is_empty());

        let ids: Vec<_> = cluster.destinations().snapshot().iter().map(|d| d.id().to_string()).collect();
        assert_eq!(ids, ["a", "c"]);
        let reloaded = cluster.destinations().get("a").unwrap();
        assert!(Arc::ptr_eq(&a, &reloaded));
        assert_eq!(reloaded.health().active, HealthState::Unhealthy);
        assert_eq!(reloaded.config().address.port(), Some(9));
    }

    #[derive(Default)]
    struct ForgettingPolicy {
        removed: std::sync::Mutex<Vec<String>>,
    }

    impl ActiveHealthCheckPolicy for ForgettingPolicy {
        fn name(&self) -> &str {
            "Forgetting"
        }

        fn probing_completed(&self, _: &ClusterConfig, _: &Destination, _: &crate::health::ProbeOutcome) {}

        fn destination_removed(&self, destination: &Destination) {
            self.removed.lock().unwrap().push(destination.id().to_string());
        }
    }

    #[test]
    fn test_policy_hears_about_removed_destinations() {
        let policy = Arc::new(ForgettingPolicy::default());
        let extensions = Extensions::with_defaults().with_health_check_policy(policy.clone());
        let config = |destinations: &[(&str, u16)], enabled: bool| {
            let mut opts = options("c1", destinations);
            opts.health_check.active.enabled = enabled;
            opts.health_check.active.policy = "Forgetting".into();
            ClusterConfig::resolve(opts, &extensions, None).0
        };

        let cluster = Cluster::with_config(config(&[("a", 1), ("b", 2)], true));
        cluster.update_config(config(&[("a", 1)], true));
        assert_eq!(*policy.removed.lock().unwrap(), ["b"]);

        // Disabling active checks releases everything the policy held.
        cluster.update_config(config(&[("a", 1), ("c", 3)], false));
        assert_eq!(*policy.removed.lock().unwrap(), ["b", "a"]);

        cluster.update_config(config(&[("a", 1), ("c", 3)], true));
        cluster.retire();
        assert_eq!(*policy.removed.lock().unwrap(), ["b", "a", "a", "c"]);
    }

    #[test]
    fn test_invalid_destination_is_skipped() {
        let mut opts = options("c1", &[("a", 1)]);
        opts.destinations.push(DestinationOptions {
            id: "bad".into(),
            address: "::nope::".into(),
            probe_address: None,
        });
        let cluster = Cluster::with_config(ClusterConfig::for_tests(opts.clone()));
        assert_eq!(cluster.destinations().len(), 1);

        let errors = cluster.update_config(ClusterConfig::for_tests(opts));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_config_swap_is_atomic_for_readers() {
        // Each generation n carries interval == timeout == n; a torn read
        // would show two different generations.
        fn generation(n: u64) -> ClusterConfig {
            let mut opts = ClusterOptions::new("c1");
            opts.health_check.active.interval_ms = Some(n);
            opts.health_check.active.timeout_ms = Some(n);
            opts.metadata.insert("generation".into(), n.to_string());
            ClusterConfig::for_tests(opts)
        }

        let cluster = Cluster::with_config(generation(1));
        let done = AtomicBool::new(false);
        std::thread::scope(|s| {
            s.spawn(|| {
                for n in 2..500 {
                    cluster.update_config(generation(n));
                }
                done.store(true, Ordering::SeqCst);
            });
            for _ in 0..4 {
                s.spawn(|| {
                    while !done.load(Ordering::SeqCst) {
                        let config = cluster.config();
                        let active = &config.options().health_check.active;
                        let n = active.interval().unwrap();
                        assert_eq!(active.timeout(), Some(n));
                        assert_eq!(config.options().metadata["generation"], n.as_millis().to_string());
                        assert!(n >= Duration::from_millis(1));
                    }
                });
            }
        });
        assert_eq!(cluster.config().options().health_check.active.interval_ms, Some(499));
    }
}
