//! Cluster set management across config reloads.
//!
//! # Responsibilities
//! - Create, update and remove clusters by id on each reload
//! - Publish the cluster map as a lock-free snapshot
//! - Notify listeners (e.g. the active health check monitor)
//!
//! # Design Decisions
//! - Reloads are serialized; readers never wait on them
//! - A cluster whose options did not change is left alone (no swap, no
//!   notification), so its health-check timer keeps its phase
//! - Listeners are notified after the new state is published

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::cluster::{Cluster, ClusterConfig, ConfigurationError, Extensions};
use crate::config::ClusterOptions;
use crate::observability::metrics;

/// Receives cluster lifecycle events.
pub trait ClusterChangeListener: Send + Sync {
    fn on_cluster_added(&self, cluster: &Arc<Cluster>);
    fn on_cluster_changed(&self, cluster: &Arc<Cluster>);
    fn on_cluster_removed(&self, cluster_id: &str);
}

/// What one `apply` did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReloadSummary {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub removed: Vec<String>,
    pub errors: Vec<ConfigurationError>,
}

impl ReloadSummary {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

pub struct ClusterManager {
    extensions: Arc<Extensions>,
    clusters: ArcSwap<HashMap<String, Arc<Cluster>>>,
    listeners: Vec<Arc<dyn ClusterChangeListener>>,
    reload_lock: Mutex<()>,
}

impl ClusterManager {
    pub fn new(extensions: Arc<Extensions>) -> Self {
        Self {
            extensions,
            clusters: ArcSwap::default(),
            listeners: Vec::new(),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn ClusterChangeListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<Cluster>> {
        self.clusters.load().get(id).cloned()
    }

    /// All clusters at this point in time.
    pub fn snapshot(&self) -> Arc<HashMap<String, Arc<Cluster>>> {
        self.clusters.load_full()
    }

    /// Bring the running cluster set in line with `desired`.
    pub fn apply(&self, desired: &[ClusterOptions]) -> ReloadSummary {
        let _guard = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.clusters.load_full();
        let mut next = HashMap::with_capacity(desired.len());
        let mut summary = ReloadSummary::default();
        let mut added = Vec::new();
        let mut changed = Vec::new();

        for options in desired {
            match current.get(&options.id) {
                Some(cluster) => {
                    let previous = cluster.config();
                    if previous.options() != options {
                        let transport = (previous.options().http_client == options.http_client)
                            .then(|| previous.transport().clone());
                        let (config, errors) = ClusterConfig::resolve(options.clone(), &self.extensions, transport);
                        summary.errors.extend(errors);
                        summary.errors.extend(cluster.update_config(config));
                        summary.changed.push(options.id.clone());
                        changed.push(cluster.clone());
                    }
                    next.insert(options.id.clone(), cluster.clone());
                }
                None => {
                    let (config, errors) = ClusterConfig::resolve(options.clone(), &self.extensions, None);
                    summary.errors.extend(errors);
                    let (cluster, errors) = Cluster::create(config);
                    summary.errors.extend(errors);
                    summary.added.push(options.id.clone());
                    added.push(cluster.clone());
                    next.insert(options.id.clone(), cluster);
                }
            }
        }

        for id in current.keys() {
            if !next.contains_key(id) {
                summary.removed.push(id.clone());
            }
        }

        self.clusters.store(Arc::new(next));

        for error in &summary.errors {
            tracing::warn!(error = %error, "Cluster configuration error");
        }
        for cluster in &added {
            self.listeners.iter().for_each(|l| l.on_cluster_added(cluster));
        }
        for cluster in &changed {
            self.listeners.iter().for_each(|l| l.on_cluster_changed(cluster));
        }
        for id in &summary.removed {
            if let Some(cluster) = current.get(id) {
                cluster.retire();
            }
            self.listeners.iter().for_each(|l| l.on_cluster_removed(id));
        }

        tracing::info!(
            added = summary.added.len(),
            changed = summary.changed.len(),
            removed = summary.removed.len(),
            errors = summary.errors.len(),
            "Cluster configuration applied"
        );
        metrics::record_config_reload(if summary.errors.is_empty() { "ok" } else { "degraded" });
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DestinationOptions;
    use crate::health::state::HealthState;

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<String>>,
    }

    impl ClusterChangeListener for RecordingListener {
        fn on_cluster_added(&self, cluster: &Arc<Cluster>) {
            self.events.lock().unwrap().push(format!("added {}", cluster.id()));
        }
        fn on_cluster_changed(&self, cluster: &Arc<Cluster>) {
            self.events.lock().unwrap().push(format!("changed {}", cluster.id()));
        }
        fn on_cluster_removed(&self, cluster_id: &str) {
            self.events.lock().unwrap().push(format!("removed {cluster_id}"));
        }
    }

    fn cluster(id: &str, destinations: &[&str]) -> ClusterOptions {
        let mut options = ClusterOptions::new(id);
        for (i, d) in destinations.iter().enumerate() {
            options.destinations.push(DestinationOptions {
                id: d.to_string(),
                address: format!("http://127.0.0.1:{}/", 7000 + i),
                probe_address: None,
            });
        }
        options
    }

    #[test]
    fn test_apply_diffs_clusters() {
        let listener = Arc::new(RecordingListener::default());
        let manager = ClusterManager::new(Arc::new(Extensions::with_defaults())).with_listener(listener.clone());

        let summary = manager.apply(&[cluster("a", &["a1"]), cluster("b", &["b1"])]);
        assert_eq!(summary.added.len(), 2);
        let a = manager.get("a").unwrap();
        let a1 = a.destinations().get("a1").unwrap();
        a1.set_active_health(HealthState::Healthy);

        let summary = manager.apply(&[cluster("a", &["a1", "a2"]), cluster("c", &[])]);
        assert_eq!(summary.added, ["c"]);
        assert_eq!(summary.changed, ["a"]);
        assert_eq!(summary.removed, ["b"]);

        let a_again = manager.get("a").unwrap();
        assert!(Arc::ptr_eq(&a, &a_again));
        let a1_again = a_again.destinations().get("a1").unwrap();
        assert!(Arc::ptr_eq(&a1, &a1_again));
        assert_eq!(a1_again.health().active, HealthState::Healthy);
        assert_eq!(a_again.destinations().len(), 2);
        assert!(manager.get("b").is_none());

        let mut events = listener.events.lock().unwrap().clone();
        events[..2].sort();
        assert_eq!(events, ["added a", "added b", "added c", "changed a", "removed b"]);
    }

    #[test]
    fn test_unchanged_cluster_is_not_touched() {
        let listener = Arc::new(RecordingListener::default());
        let manager = ClusterManager::new(Arc::new(Extensions::with_defaults())).with_listener(listener.clone());

        manager.apply(&[cluster("a", &["a1"])]);
        let before = manager.get("a").unwrap().config();
        let summary = manager.apply(&[cluster("a", &["a1"])]);

        assert!(summary.is_noop());
        assert!(Arc::ptr_eq(&before, &manager.get("a").unwrap().config()));
        assert_eq!(listener.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_configuration_errors_do_not_reject_cluster() {
        let manager = ClusterManager::new(Arc::new(Extensions::with_defaults()));
        let mut options = cluster("a", &["a1"]);
        options.health_check.active.enabled = true;
        options.health_check.active.policy = "Unknown".into();

        let summary = manager.apply(&[options]);
        assert_eq!(
            summary.errors,
            [ConfigurationError::UnknownHealthCheckPolicy {
                cluster: "a".into(),
                policy: "Unknown".into(),
            }]
        );
        let a = manager.get("a").unwrap();
        assert!(!a.config().active_health_checks_enabled());
        assert_eq!(a.destinations().len(), 1);
    }
}
