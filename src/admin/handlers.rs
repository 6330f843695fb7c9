use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::time::Instant;
use tokio::sync::oneshot;

use crate::admin::AdminState;
use crate::cluster::Cluster;
use crate::health::{DestinationHealth, HealthState};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub clusters: usize,
    pub scheduled_health_checks: usize,
}

#[derive(Serialize)]
pub struct ClusterStatus {
    pub id: String,
    pub active_health_checks: bool,
    pub session_affinity: Option<String>,
    pub load_balancer: String,
    pub destinations: Vec<DestinationStatus>,
}

#[derive(Serialize)]
pub struct DestinationStatus {
    pub id: String,
    pub address: String,
    pub probe_address: String,
    pub health: DestinationHealth,
    pub effective_health: HealthState,
    pub concurrent_requests: usize,
}

#[derive(Serialize)]
pub struct HealthCheckReport {
    pub completed: bool,
    pub duration_ms: u64,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        clusters: state.clusters.snapshot().len(),
        scheduled_health_checks: state.monitor.scheduled_clusters().len(),
    })
}

fn cluster_status(cluster: &Cluster) -> ClusterStatus {
    let config = cluster.config();
    let destinations = cluster
        .destinations()
        .snapshot()
        .iter()
        .map(|d| {
            let addresses = d.config();
            let health = d.health();
            DestinationStatus {
                id: d.id().to_string(),
                address: addresses.address.to_string(),
                probe_address: addresses.probe_address().to_string(),
                health,
                effective_health: health.effective(),
                concurrent_requests: d.concurrent_requests(),
            }
        })
        .collect();

    ClusterStatus {
        id: cluster.id().to_string(),
        active_health_checks: config.active_health_checks_enabled(),
        session_affinity: config.session_affinity().map(|p| p.mode().to_string()),
        load_balancer: config.load_balancer().name().to_string(),
        destinations,
    }
}

pub async fn get_clusters(State(state): State<AdminState>) -> Json<Vec<ClusterStatus>> {
    let clusters = state.clusters.snapshot();
    let mut statuses: Vec<_> = clusters.values().map(|c| cluster_status(c)).collect();
    statuses.sort_by(|a, b| a.id.cmp(&b.id));
    Json(statuses)
}

pub async fn force_health_check(
    State(state): State<AdminState>,
) -> Result<Json<HealthCheckReport>, StatusCode> {
    let started = Instant::now();
    let (tx, rx) = oneshot::channel();
    state.monitor.force_check_all(move || {
        let _ = tx.send(());
    });

    match rx.await {
        Ok(()) => Ok(Json(HealthCheckReport {
            completed: true,
            duration_ms: started.elapsed().as_millis() as u64,
        })),
        Err(_) => {
            tracing::error!("Forced health check aborted before completion");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
