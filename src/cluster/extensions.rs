//! Named extension registry.
//!
//! Health check policies, affinity modes and load balancers are looked up
//! by the names clusters reference. Lookups happen once per cluster config
//! build, never per request or per probe.

use std::collections::HashMap;
use std::sync::Arc;

use crate::affinity::{CookieAffinityProvider, CustomHeaderAffinityProvider, SessionAffinityProvider};
use crate::health::consecutive_failures::ConsecutiveFailuresPolicy;
use crate::health::policy::ActiveHealthCheckPolicy;
use crate::load_balancer::{First, LeastRequests, LoadBalancer, PowerOfTwoChoices, Random, RoundRobin};

#[derive(Default)]
pub struct Extensions {
    health_check_policies: HashMap<String, Arc<dyn ActiveHealthCheckPolicy>>,
    affinity_providers: HashMap<String, Arc<dyn SessionAffinityProvider>>,
    load_balancers: HashMap<String, Arc<dyn LoadBalancer>>,
}

impl Extensions {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with every built-in extension.
    pub fn with_defaults() -> Self {
        Self::empty()
            .with_health_check_policy(Arc::new(ConsecutiveFailuresPolicy::new()))
            .with_affinity_provider(Arc::new(CookieAffinityProvider))
            .with_affinity_provider(Arc::new(CustomHeaderAffinityProvider))
            .with_load_balancer(Arc::new(First))
            .with_load_balancer(Arc::new(Random))
            .with_load_balancer(Arc::new(RoundRobin::new()))
            .with_load_balancer(Arc::new(LeastRequests::new()))
            .with_load_balancer(Arc::new(PowerOfTwoChoices))
    }

    /// Register a policy under its own name, replacing any previous one.
    pub fn with_health_check_policy(mut self, policy: Arc<dyn ActiveHealthCheckPolicy>) -> Self {
        self.health_check_policies.insert(policy.name().to_string(), policy);
        self
    }

    pub fn with_affinity_provider(mut self, provider: Arc<dyn SessionAffinityProvider>) -> Self {
        self.affinity_providers.insert(provider.mode().to_string(), provider);
        self
    }

    pub fn with_load_balancer(mut self, balancer: Arc<dyn LoadBalancer>) -> Self {
        self.load_balancers.insert(balancer.name().to_string(), balancer);
        self
    }

    pub fn health_check_policy(&self, name: &str) -> Option<Arc<dyn ActiveHealthCheckPolicy>> {
        self.health_check_policies.get(name).cloned()
    }

    pub fn affinity_provider(&self, mode: &str) -> Option<Arc<dyn SessionAffinityProvider>> {
        self.affinity_providers.get(mode).cloned()
    }

    pub fn load_balancer(&self, name: &str) -> Option<Arc<dyn LoadBalancer>> {
        self.load_balancers.get(name).cloned()
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("health_check_policies", &self.health_check_policies.keys().collect::<Vec<_>>())
            .field("affinity_providers", &self.affinity_providers.keys().collect::<Vec<_>>())
            .field("load_balancers", &self.load_balancers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_registered() {
        let extensions = Extensions::with_defaults();
        assert!(extensions.health_check_policy("ConsecutiveFailures").is_some());
        assert!(extensions.affinity_provider("Cookie").is_some());
        assert!(extensions.affinity_provider("CustomHeader").is_some());
        for name in ["First", "Random", "RoundRobin", "LeastRequests", "PowerOfTwoChoices"] {
            assert_eq!(extensions.load_balancer(name).unwrap().name(), name);
        }
        assert!(extensions.load_balancer("Nope").is_none());
    }
}
