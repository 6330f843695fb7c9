//! Session affinity subsystem.
//!
//! # Data Flow
//! ```text
//! Request arrives for cluster
//!     → provider.try_find_affinitized_destinations (read affinity key)
//!         - KeyNotPresent / DestinationNotFound / DestinationDisabled
//!           → caller balances over the full candidate set
//!         - KeyExtracted → balancer restricted to the matched set
//!     → balancer picks destination
//!     → provider.affinitize_request (write key: cookie.rs / header.rs)
//! ```
//!
//! # Design Decisions
//! - The affinity key is the destination id
//! - Lookup is pure: it never mutates the request or destination state
//! - A miss is advisory, never a routing failure
//! - Modes are registered by name and resolved once per cluster config

pub mod cookie;
pub mod header;

use axum::http::HeaderMap;
use std::sync::Arc;

use crate::cluster::destination::Destination;
use crate::config::SessionAffinityOptions;
use crate::health::state::HealthState;

pub use cookie::CookieAffinityProvider;
pub use header::CustomHeaderAffinityProvider;

/// Outcome of an affinity lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffinityStatus {
    /// The request carries no affinity key.
    KeyNotPresent,
    /// The key was read and matched a live, available destination.
    KeyExtracted,
    /// The key names a destination that is not among the candidates.
    DestinationNotFound,
    /// The key names a candidate that is currently unhealthy.
    DestinationDisabled,
}

#[derive(Debug, Clone)]
pub struct AffinityResult {
    /// Matched subset of the candidates; empty unless found.
    pub destinations: Vec<Arc<Destination>>,
    pub status: AffinityStatus,
}

impl AffinityResult {
    fn miss(status: AffinityStatus) -> Self {
        Self {
            destinations: Vec::new(),
            status,
        }
    }

    /// True when the candidate set should be narrowed to `destinations`.
    pub fn found(&self) -> bool {
        self.status == AffinityStatus::KeyExtracted && !self.destinations.is_empty()
    }
}

pub trait SessionAffinityProvider: Send + Sync {
    /// Name referenced by `session_affinity.mode`.
    fn mode(&self) -> &str;

    /// Read the raw affinity key from the incoming request.
    fn extract_key(&self, request: &HeaderMap, options: &SessionAffinityOptions) -> Option<String>;

    /// Write the affinity key onto the outgoing response, replacing any
    /// earlier value written by this mode.
    fn write_key(&self, response: &mut HeaderMap, options: &SessionAffinityOptions, key: &str);

    /// Find the candidates the request is affinitized to.
    fn try_find_affinitized_destinations(
        &self,
        request: &HeaderMap,
        candidates: &[Arc<Destination>],
        cluster_id: &str,
        options: &SessionAffinityOptions,
    ) -> AffinityResult {
        let Some(key) = self.extract_key(request, options).filter(|k| !k.is_empty()) else {
            return AffinityResult::miss(AffinityStatus::KeyNotPresent);
        };

        let matched: Vec<_> = candidates.iter().filter(|d| d.id() == key).cloned().collect();
        if matched.is_empty() {
            tracing::debug!(cluster = %cluster_id, key = %key, "Affinitized destination not found");
            return AffinityResult::miss(AffinityStatus::DestinationNotFound);
        }
        if matched.iter().all(|d| d.health().effective() == HealthState::Unhealthy) {
            tracing::debug!(cluster = %cluster_id, key = %key, "Affinitized destination is unhealthy");
            return AffinityResult::miss(AffinityStatus::DestinationDisabled);
        }

        AffinityResult {
            destinations: matched,
            status: AffinityStatus::KeyExtracted,
        }
    }

    /// Record the affinity to `destination` so later requests resolve to it.
    fn affinitize_request(&self, response: &mut HeaderMap, options: &SessionAffinityOptions, destination: &Destination) {
        self.write_key(response, options, destination.id());
    }
}
