//! Admin HTTP surface.
//!
//! # Endpoints
//! - `GET /admin/status`: version and cluster counts
//! - `GET /admin/clusters`: clusters, destinations and their health
//! - `POST /admin/health/check`: force a health sweep, respond when done
//!
//! All endpoints require `Authorization: Bearer <api_key>`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::cluster::ClusterManager;
use crate::health::ActiveHealthCheckMonitor;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared state of admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub clusters: Arc<ClusterManager>,
    pub monitor: Arc<ActiveHealthCheckMonitor>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/clusters", get(get_clusters))
        .route("/admin/health/check", post(force_health_check))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin router until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AdminState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin endpoint listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Admin endpoint stopped");
    Ok(())
}
