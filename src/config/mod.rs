//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → ClusterManager::apply (diff against running clusters)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → sent over channel to the reload task
//!     → per-cluster snapshot swap, destination reconciliation
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Extension names (policies, modes) are resolved later, at cluster load

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ActiveHealthCheckOptions, AdminConfig, ClusterHealthCheckOptions, ClusterOptions,
    DestinationOptions, HealthCheckConfig, HttpClientOptions, ObservabilityConfig, ProxyConfig,
    SessionAffinityOptions,
};
pub use validation::ValidationError;
