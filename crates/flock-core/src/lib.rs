//! flock-core — shared domain types and configuration for flock.
//!
//! Defines the `Server` entity (identity plus last-probed live state),
//! the `HealthReport` wire shape returned by instance health endpoints,
//! and `FlockConfig`, the TOML-backed daemon configuration with its
//! startup validation rules.

pub mod config;
pub mod types;

pub use config::{ConfigError, FlockConfig, parse_duration};
pub use types::{FleetSnapshot, HealthReport, PoolKind, Server, ServerId, ServerSnapshot, ServerStatus};
