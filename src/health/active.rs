//! Active health checking.
//!
//! # Responsibilities
//! - Keep one recurring probe schedule per cluster with active checks on
//! - Fan out one concurrent probe per destination each cycle
//! - Hand every outcome to the cluster's policy, uninterpreted
//! - Run an on-demand sweep across all clusters (`check_all`)
//!
//! # Schedule lifecycle
//! ```text
//! Unscheduled → Scheduled → Probing → Scheduled → ... → Cancelled
//! ```
//! A schedule owns a stop channel. Dropping the sender cancels future
//! ticks; a cycle already running is its own task and finishes normally.
//! A policy panic ends the schedule and removes its entry before the panic
//! is re-raised.
//!
//! Process-wide defaults sit behind an `ArcSwap` and can be replaced at
//! runtime (`set_defaults`). Timeouts are read per cycle; intervals are
//! re-evaluated by rescheduling.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::panic;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::cluster::{Cluster, ClusterChangeListener};
use crate::config::HealthCheckConfig;
use crate::health::probe::{send_probe, ProbeError};
use crate::observability::metrics;

/// A cluster's running timer. Dropping it cancels the timer.
struct Schedule {
    cluster: Arc<Cluster>,
    interval: Duration,
    generation: u64,
    _stop: broadcast::Sender<()>,
}

type Schedules = Mutex<HashMap<String, Schedule>>;

pub struct ActiveHealthCheckMonitor {
    defaults: Arc<ArcSwap<HealthCheckConfig>>,
    clusters: Mutex<HashMap<String, Arc<Cluster>>>,
    schedules: Arc<Schedules>,
    next_generation: AtomicU64,
}

impl ActiveHealthCheckMonitor {
    pub fn new(defaults: &HealthCheckConfig) -> Self {
        Self {
            defaults: Arc::new(ArcSwap::from_pointee(defaults.clone())),
            clusters: Mutex::new(HashMap::new()),
            schedules: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Replace the process-wide defaults.
    ///
    /// Clusters without their own interval are rescheduled onto the new
    /// default; the new default timeout applies from the next cycle.
    pub fn set_defaults(&self, defaults: &HealthCheckConfig) {
        let previous = self.defaults.swap(Arc::new(defaults.clone()));
        if previous.default_interval_ms == defaults.default_interval_ms
            && previous.default_timeout_ms == defaults.default_timeout_ms
        {
            return;
        }
        tracing::info!(
            default_interval_ms = defaults.default_interval_ms,
            default_timeout_ms = defaults.default_timeout_ms,
            "Health check defaults updated"
        );

        let clusters: Vec<_> = self
            .clusters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for cluster in &clusters {
            self.reschedule(cluster);
        }
    }

    /// Effective interval of a cluster: its own value, else the default.
    fn interval_for(&self, cluster: &Cluster) -> Duration {
        cluster
            .config()
            .options()
            .health_check
            .active
            .interval()
            .unwrap_or_else(|| self.defaults.load().default_interval())
    }

    fn default_timeout(&self) -> Duration {
        self.defaults.load().default_timeout()
    }

    /// Ids of clusters with a live schedule.
    pub fn scheduled_clusters(&self) -> Vec<String> {
        let schedules = self.schedules.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<_> = schedules.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Start tracking a cluster and schedule it if active checks are on.
    pub fn add_cluster(&self, cluster: &Arc<Cluster>) {
        self.clusters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cluster.id().to_string(), cluster.clone());
        self.reschedule(cluster);
    }

    /// Re-evaluate a cluster after its config changed.
    pub fn update_cluster(&self, cluster: &Arc<Cluster>) {
        self.add_cluster(cluster);
    }

    /// Stop probing a cluster. A cycle already in flight completes.
    pub fn remove_cluster(&self, cluster_id: &str) {
        self.clusters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(cluster_id);
        let removed = self
            .schedules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(cluster_id);
        if removed.is_some() {
            tracing::info!(cluster = %cluster_id, "Active health checks cancelled");
        }
    }

    /// Cancel every schedule.
    pub fn shutdown(&self) {
        let mut schedules = self.schedules.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::info!(schedules = schedules.len(), "Health monitor shutting down");
        schedules.clear();
    }

    fn reschedule(&self, cluster: &Arc<Cluster>) {
        let mut schedules = self.schedules.lock().unwrap_or_else(PoisonError::into_inner);
        let id = cluster.id();

        if !cluster.config().active_health_checks_enabled() {
            if schedules.remove(id).is_some() {
                tracing::info!(cluster = %id, "Active health checks disabled");
            }
            return;
        }

        let interval = self.interval_for(cluster);
        if schedules
            .get(id)
            .is_some_and(|s| s.interval == interval && Arc::ptr_eq(&s.cluster, cluster))
        {
            return;
        }

        let (stop, stop_rx) = broadcast::channel(1);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let task = ScheduleTask {
            cluster: cluster.clone(),
            interval,
            generation,
            defaults: self.defaults.clone(),
            schedules: Arc::downgrade(&self.schedules),
        };
        tokio::spawn(task.run(stop_rx));
        let schedule = Schedule {
            cluster: cluster.clone(),
            interval,
            generation,
            _stop: stop,
        };
        let previous = schedules.insert(id.to_string(), schedule);

        tracing::info!(
            cluster = %id,
            interval_ms = interval.as_millis() as u64,
            rescheduled = previous.is_some(),
            "Active health checks scheduled"
        );
    }

    /// Probe every destination of every enabled cluster once, now.
    ///
    /// Resolves after every dispatched probe has completed. Cluster timers
    /// are not touched.
    pub async fn check_all(&self) {
        let clusters = self.enabled_clusters();
        tracing::info!(clusters = clusters.len(), "Forced health check started");

        let mut cycles = JoinSet::new();
        for cluster in clusters {
            cycles.spawn(probe_cluster(cluster, self.default_timeout()));
        }
        join_all(&mut cycles).await;

        tracing::info!("Forced health check completed");
    }

    /// Callback form of [`check_all`](Self::check_all).
    ///
    /// `on_complete` runs exactly once: immediately when no cluster has
    /// active checks enabled, otherwise after the last probe finished.
    /// Must be called within a Tokio runtime.
    pub fn force_check_all<F>(&self, on_complete: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let clusters = self.enabled_clusters();
        if clusters.is_empty() {
            on_complete();
            return;
        }

        let default_timeout = self.default_timeout();
        tokio::spawn(async move {
            let mut cycles = JoinSet::new();
            for cluster in clusters {
                cycles.spawn(probe_cluster(cluster, default_timeout));
            }
            join_all(&mut cycles).await;
            on_complete();
        });
    }

    fn enabled_clusters(&self) -> Vec<Arc<Cluster>> {
        let clusters = self.clusters.lock().unwrap_or_else(PoisonError::into_inner);
        clusters
            .values()
            .filter(|c| c.config().active_health_checks_enabled())
            .cloned()
            .collect()
    }
}

impl ClusterChangeListener for ActiveHealthCheckMonitor {
    fn on_cluster_added(&self, cluster: &Arc<Cluster>) {
        self.add_cluster(cluster);
    }

    fn on_cluster_changed(&self, cluster: &Arc<Cluster>) {
        self.update_cluster(cluster);
    }

    fn on_cluster_removed(&self, cluster_id: &str) {
        self.remove_cluster(cluster_id);
    }
}

/// State moved into one cluster's timer task.
struct ScheduleTask {
    cluster: Arc<Cluster>,
    interval: Duration,
    generation: u64,
    defaults: Arc<ArcSwap<HealthCheckConfig>>,
    schedules: Weak<Schedules>,
}

impl ScheduleTask {
    /// Recurring timer of one cluster. The first cycle fires after one full
    /// interval. Each cycle runs as its own task so that cancelling the
    /// timer never aborts it.
    async fn run(self, mut stop: broadcast::Receiver<()>) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stop.recv() => break,
                _ = ticker.tick() => {
                    let timeout = self.defaults.load().default_timeout();
                    let cycle = tokio::spawn(probe_cluster(self.cluster.clone(), timeout));
                    if let Err(e) = cycle.await {
                        if e.is_panic() {
                            self.abandon();
                            panic::resume_unwind(e.into_panic());
                        }
                    }
                }
            }
        }

        tracing::debug!(cluster = %self.cluster.id(), "Health check schedule stopped");
    }

    /// Drop this schedule's entry, unless it was already replaced.
    fn abandon(&self) {
        let id = self.cluster.id();
        tracing::error!(cluster = %id, "Health check policy panicked, schedule stopped");

        let Some(schedules) = self.schedules.upgrade() else {
            return;
        };
        let mut schedules = schedules.lock().unwrap_or_else(PoisonError::into_inner);
        if schedules.get(id).is_some_and(|s| s.generation == self.generation) {
            schedules.remove(id);
        }
    }
}

/// One probe cycle over a snapshot of the cluster's destinations.
async fn probe_cluster(cluster: Arc<Cluster>, default_timeout: Duration) {
    let config = cluster.config();
    let Some(policy) = config.health_check_policy().cloned() else {
        return;
    };
    let active = &config.options().health_check.active;
    let timeout = active.timeout().unwrap_or(default_timeout);
    let destinations = cluster.destinations().snapshot();

    tracing::debug!(
        cluster = %cluster.id(),
        destinations = destinations.len(),
        policy = %policy.name(),
        "Probing cluster"
    );

    let mut probes = JoinSet::new();
    for destination in destinations.iter().cloned() {
        let config = config.clone();
        let policy = policy.clone();
        probes.spawn(async move {
            let active = &config.options().health_check.active;
            let outcome = send_probe(config.transport(), &destination.config(), &active.path, timeout).await;

            match &outcome {
                Ok(response) => {
                    tracing::debug!(
                        cluster = %config.id(),
                        destination = %destination.id(),
                        status = %response.status(),
                        "Probe completed"
                    );
                    metrics::record_probe(config.id(), "response");
                }
                Err(e) => {
                    tracing::warn!(
                        cluster = %config.id(),
                        destination = %destination.id(),
                        error = %e,
                        "Probe failed"
                    );
                    let label = match e {
                        ProbeError::Timeout(_) => "timeout",
                        _ => "error",
                    };
                    metrics::record_probe(config.id(), label);
                }
            }

            policy.probing_completed(&config, &destination, &outcome);
        });
    }
    join_all(&mut probes).await;

    tracing::debug!(cluster = %cluster.id(), "Probe cycle completed");
}

/// Wait for every task; re-raise the first panic once all have finished.
async fn join_all(tasks: &mut JoinSet<()>) {
    let mut panicked = None;
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            if e.is_panic() && panicked.is_none() {
                panicked = Some(e.into_panic());
            }
        }
    }
    if let Some(payload) = panicked {
        panic::resume_unwind(payload);
    }
}
