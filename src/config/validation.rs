//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check identity uniqueness (cluster ids, destination ids per cluster)
//! - Validate value ranges (intervals and timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Unknown policy/mode names are not checked here; they surface as
//!   load-time configuration errors and only disable the affected subsystem

use std::collections::HashSet;
use thiserror::Error;
use url::Url;
use crate::config::schema::{ClusterOptions, ProxyConfig};

/// A single semantic problem in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cluster id must not be empty")]
    EmptyClusterId,

    #[error("duplicate cluster id '{0}'")]
    DuplicateCluster(String),

    #[error("cluster '{cluster}': destination id must not be empty")]
    EmptyDestinationId { cluster: String },

    #[error("cluster '{cluster}': duplicate destination id '{destination}'")]
    DuplicateDestination { cluster: String, destination: String },

    #[error("cluster '{cluster}', destination '{destination}': invalid {field} '{value}'")]
    InvalidAddress {
        cluster: String,
        destination: String,
        field: &'static str,
        value: String,
    },

    #[error("cluster '{cluster}': {field} must be greater than zero")]
    ZeroDuration { cluster: String, field: &'static str },

    #[error("health_check.{0} must be greater than zero")]
    ZeroDefault(&'static str),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.health_check.default_interval_ms == 0 {
        errors.push(ValidationError::ZeroDefault("default_interval_ms"));
    }
    if config.health_check.default_timeout_ms == 0 {
        errors.push(ValidationError::ZeroDefault("default_timeout_ms"));
    }

    let mut seen = HashSet::new();
    for cluster in &config.clusters {
        if cluster.id.is_empty() {
            errors.push(ValidationError::EmptyClusterId);
        } else if !seen.insert(cluster.id.as_str()) {
            errors.push(ValidationError::DuplicateCluster(cluster.id.clone()));
        }
        validate_cluster(cluster, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_cluster(cluster: &ClusterOptions, errors: &mut Vec<ValidationError>) {
    let active = &cluster.health_check.active;
    if active.interval_ms == Some(0) {
        errors.push(ValidationError::ZeroDuration {
            cluster: cluster.id.clone(),
            field: "interval_ms",
        });
    }
    if active.timeout_ms == Some(0) {
        errors.push(ValidationError::ZeroDuration {
            cluster: cluster.id.clone(),
            field: "timeout_ms",
        });
    }

    let mut seen = HashSet::new();
    for destination in &cluster.destinations {
        if destination.id.is_empty() {
            errors.push(ValidationError::EmptyDestinationId {
                cluster: cluster.id.clone(),
            });
            continue;
        }
        if !seen.insert(destination.id.as_str()) {
            errors.push(ValidationError::DuplicateDestination {
                cluster: cluster.id.clone(),
                destination: destination.id.clone(),
            });
        }

        let addresses = std::iter::once(("address", Some(&destination.address)))
            .chain(std::iter::once(("probe_address", destination.probe_address.as_ref())));
        for (field, value) in addresses {
            let Some(value) = value else { continue };
            if Url::parse(value).is_err() {
                errors.push(ValidationError::InvalidAddress {
                    cluster: cluster.id.clone(),
                    destination: destination.id.clone(),
                    field,
                    value: value.clone(),
                });
            }
        }
    }
}
