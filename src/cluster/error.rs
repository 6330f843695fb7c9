//! Load-time configuration errors.

use thiserror::Error;

/// A cluster references an extension that is not registered.
///
/// The cluster is still loaded; only the affected subsystem is inert.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("cluster '{cluster}': unknown active health check policy '{policy}', active checks disabled")]
    UnknownHealthCheckPolicy { cluster: String, policy: String },

    #[error("cluster '{cluster}': unknown session affinity mode '{mode}', affinity disabled")]
    UnknownAffinityMode { cluster: String, mode: String },

    #[error("cluster '{cluster}': unknown load balancing policy '{policy}', using '{fallback}'")]
    UnknownLoadBalancingPolicy {
        cluster: String,
        policy: String,
        fallback: &'static str,
    },

    #[error("cluster '{cluster}', destination '{destination}': invalid address '{address}'")]
    InvalidDestinationAddress {
        cluster: String,
        destination: String,
        address: String,
    },
}
