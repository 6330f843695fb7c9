//! Destination health state.
//!
//! # States
//! - Unknown: not probed yet (or policy undecided), still receives traffic
//! - Healthy: receives traffic
//! - Unhealthy: excluded from load balancing
//!
//! Active and passive checks each own one sub-state. The effective state
//! used for selection is derived from both:
//! ```text
//! either Unhealthy → Unhealthy
//! either Healthy   → Healthy
//! otherwise        → Unknown
//! ```

use serde::Serialize;

/// Health State enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum HealthState {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthState {
    /// Gauge value exported for this state.
    pub fn as_gauge(self) -> f64 {
        match self {
            HealthState::Healthy => 1.0,
            HealthState::Unhealthy => 0.0,
            HealthState::Unknown => -1.0,
        }
    }
}

/// Immutable health record of one destination. Replaced whole on every write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DestinationHealth {
    pub active: HealthState,
    pub passive: HealthState,
}

impl DestinationHealth {
    pub fn with_active(self, active: HealthState) -> Self {
        Self { active, ..self }
    }

    pub fn with_passive(self, passive: HealthState) -> Self {
        Self { passive, ..self }
    }

    pub fn effective(&self) -> HealthState {
        use HealthState::*;
        match (self.active, self.passive) {
            (Unhealthy, _) | (_, Unhealthy) => Unhealthy,
            (Healthy, _) | (_, Healthy) => Healthy,
            _ => Unknown,
        }
    }

    /// Return true if the destination may receive traffic (Healthy or Unknown).
    pub fn is_available(&self) -> bool {
        self.effective() != HealthState::Unhealthy
    }
}
