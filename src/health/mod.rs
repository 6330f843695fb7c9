//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Per-cluster timer (or forced sweep)
//!     → Snapshot the cluster's destinations
//!     → probe.rs: one concurrent GET per destination, bounded by timeout
//!     → policy.rs: cluster's named policy interprets each outcome
//!     → Destination active state replaced (state.rs)
//!
//! Passive health checks (external):
//!     Request outcome observed by the forwarder
//!     → Destination passive state replaced (state.rs)
//!
//! State (state.rs):
//!     Active + Passive sub-states → effective health for selection
//! ```
//!
//! # Design Decisions
//! - Active and passive checks are complementary and tracked separately
//! - The monitor never interprets status codes; policies do
//! - A failing probe never affects sibling probes or other clusters
//! - Health state is per-destination, written as whole-record swaps

pub mod active;
pub mod consecutive_failures;
pub mod policy;
pub mod probe;
pub mod state;

pub use active::ActiveHealthCheckMonitor;
pub use consecutive_failures::ConsecutiveFailuresPolicy;
pub use policy::ActiveHealthCheckPolicy;
pub use probe::{ProbeError, ProbeOutcome};
pub use state::{DestinationHealth, HealthState};
