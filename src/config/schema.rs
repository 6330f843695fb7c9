//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the runtime.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Root configuration for the proxy runtime.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Process-wide health check defaults.
    pub health_check: HealthCheckConfig,

    /// Backend clusters and their destinations.
    pub clusters: Vec<ClusterOptions>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin surface settings.
    pub admin: AdminConfig,
}

/// Process-wide fallbacks for clusters that leave interval/timeout unset.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Probe interval used when a cluster does not set one, in milliseconds.
    pub default_interval_ms: u64,

    /// Probe timeout used when a cluster does not set one, in milliseconds.
    pub default_timeout_ms: u64,
}

impl HealthCheckConfig {
    pub fn default_interval(&self) -> Duration {
        Duration::from_millis(self.default_interval_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: 10_000,
            default_timeout_ms: 5_000,
        }
    }
}

/// A backend pool.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClusterOptions {
    /// Unique cluster identifier.
    pub id: String,

    #[serde(default)]
    pub health_check: ClusterHealthCheckOptions,

    #[serde(default)]
    pub session_affinity: SessionAffinityOptions,

    /// Name of the load balancing algorithm.
    #[serde(default = "default_load_balancing_policy")]
    pub load_balancing_policy: String,

    /// Outbound transport settings shared by probes and forwarded traffic.
    #[serde(default)]
    pub http_client: HttpClientOptions,

    /// Free-form settings consumed by extensions (e.g. health policy thresholds).
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    #[serde(default)]
    pub destinations: Vec<DestinationOptions>,
}

fn default_load_balancing_policy() -> String {
    "PowerOfTwoChoices".to_string()
}

impl ClusterOptions {
    /// A cluster with defaults everywhere and no destinations.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            health_check: ClusterHealthCheckOptions::default(),
            session_affinity: SessionAffinityOptions::default(),
            load_balancing_policy: default_load_balancing_policy(),
            http_client: HttpClientOptions::default(),
            metadata: HashMap::new(),
            destinations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterHealthCheckOptions {
    pub active: ActiveHealthCheckOptions,
}

/// Active (proxy-initiated) health probing for one cluster.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ActiveHealthCheckOptions {
    /// Enable active health checks.
    pub enabled: bool,

    /// Probe interval in milliseconds; falls back to the process default.
    pub interval_ms: Option<u64>,

    /// Probe timeout in milliseconds; falls back to the process default.
    pub timeout_ms: Option<u64>,

    /// Name of the policy interpreting probe outcomes.
    pub policy: String,

    /// Path appended to the probe address.
    pub path: String,
}

impl ActiveHealthCheckOptions {
    pub fn interval(&self) -> Option<Duration> {
        self.interval_ms.map(Duration::from_millis)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ActiveHealthCheckOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: None,
            timeout_ms: None,
            policy: "ConsecutiveFailures".to_string(),
            path: "/health".to_string(),
        }
    }
}

/// Sticky session settings for one cluster.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionAffinityOptions {
    pub enabled: bool,

    /// Name of the affinity mode (e.g. "Cookie", "CustomHeader").
    pub mode: String,

    /// Mode-specific settings.
    pub settings: HashMap<String, String>,
}

impl Default for SessionAffinityOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: "Cookie".to_string(),
            settings: HashMap::new(),
        }
    }
}

/// Outbound HTTP client settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpClientOptions {
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,

    /// Maximum idle pooled connections per destination host.
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout_ms: None,
            pool_max_idle_per_host: 32,
        }
    }
}

/// One backend endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DestinationOptions {
    /// Stable identifier; health state follows the id across reloads.
    pub id: String,

    /// Forwarding address (e.g. "http://127.0.0.1:3000/").
    pub address: String,

    /// Address used for active probes instead of `address`.
    #[serde(default)]
    pub probe_address: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin endpoint.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin endpoint bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
