//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! health/, cluster/ events:
//!     → logging.rs (tracing subscriber, env filter, stdout)
//!     → metrics.rs (probe counters, destination health gauges, reload counters)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Prometheus scrape of the exporter listener
//! ```
//!
//! # Design Decisions
//! - `cluster` and `destination` are structured fields on every health event
//! - Recording without an installed exporter is a no-op, so tests never
//!   need one

pub mod logging;
pub mod metrics;
