//! Proxy runtime control plane.
//!
//! # Architecture Overview
//!
//! ```text
//!   proxy.toml ──▶ config loader ──▶ ClusterManager ──▶ Cluster (config snapshot)
//!        ▲                               │                  └─ DestinationRegistry
//!        │                               │ added/changed/removed
//!   ConfigWatcher (hot reload)           ▼
//!                               ActiveHealthCheckMonitor
//!                                 per-cluster timer ──▶ probes ──▶ policy ──▶ health
//!
//!   admin endpoint ──▶ status / clusters / forced health sweep
//! ```
//!
//! Request forwarding lives outside this binary; it consumes
//! `pick_destination` and the destination health published here.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use proxy_runtime::admin::{self, AdminState};
use proxy_runtime::cluster::{ClusterChangeListener, ClusterManager, Extensions};
use proxy_runtime::config::{load_config, watcher::ConfigWatcher};
use proxy_runtime::health::ActiveHealthCheckMonitor;
use proxy_runtime::lifecycle::shutdown_signal;
use proxy_runtime::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "proxy-runtime")]
#[command(about = "Cluster, health check and load balancing runtime", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "proxy.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        clusters = config.clusters.len(),
        "proxy-runtime starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let monitor = Arc::new(ActiveHealthCheckMonitor::new(&config.health_check));
    let listener: Arc<dyn ClusterChangeListener> = monitor.clone();
    let clusters = Arc::new(
        ClusterManager::new(Arc::new(Extensions::with_defaults())).with_listener(listener),
    );
    clusters.apply(&config.clusters);

    // Hot reload. The watcher handle must outlive the reload loop.
    let (watcher, mut updates) = ConfigWatcher::new(&args.config);
    let _watcher = match watcher.run() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
            None
        }
    };
    let reload_clusters = clusters.clone();
    let reload_monitor = monitor.clone();
    tokio::spawn(async move {
        while let Some(new_config) = updates.recv().await {
            reload_monitor.set_defaults(&new_config.health_check);
            reload_clusters.apply(&new_config.clusters);
        }
    });

    if config.admin.enabled {
        let state = AdminState {
            clusters: clusters.clone(),
            monitor: monitor.clone(),
            api_key: config.admin.api_key.as_str().into(),
        };
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        admin::serve(listener, state, shutdown_signal()).await?;
    } else {
        shutdown_signal().await;
    }

    monitor.shutdown();
    tracing::info!("Shutdown complete");
    Ok(())
}
