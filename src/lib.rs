//! Proxy runtime control plane.
//!
//! Clusters of destinations, active health checking, session affinity and
//! load balancing, driven by a hot-reloadable TOML config.

pub mod admin;
pub mod affinity;
pub mod cluster;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use cluster::{Cluster, ClusterManager, Destination, Extensions};
pub use config::ProxyConfig;
pub use health::ActiveHealthCheckMonitor;
pub use load_balancer::pick_destination;
