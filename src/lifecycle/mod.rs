//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Init logging/metrics → Apply clusters → Start watcher, admin
//!
//! Shutdown (signals.rs):
//!     SIGTERM/SIGINT → cancel health-check schedules → stop admin → exit
//! ```

pub mod signals;

pub use signals::shutdown_signal;
