//! flock.toml configuration parser.
//!
//! Margins are a hard contract: the downscale margin must strictly exceed
//! the upscale margin, otherwise the decision function oscillates. Violations
//! are rejected at startup rather than tolerated at runtime.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating configuration. All fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("downscale_margin ({downscale}) must exceed upscale_margin ({upscale})")]
    Margins { upscale: u64, downscale: u64 },
}

/// Daemon configuration, loaded from `flock.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FlockConfig {
    #[serde(default)]
    pub scaling: ScalingConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub compute: ComputeConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

/// Margins and cadence for the autoscaling control loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalingConfig {
    /// Minimum spare capacity: one server is provisioned when the aggregate
    /// drops below this.
    pub upscale_margin: u64,
    /// Maximum spare capacity: one server is drained when the aggregate
    /// exceeds this.
    pub downscale_margin: u64,
    /// Sleep between control-loop cycles (e.g. "30s").
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval: String,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            upscale_margin: 10,
            downscale_margin: 40,
            cycle_interval: default_cycle_interval(),
        }
    }
}

impl ScalingConfig {
    /// Parsed cycle interval, defaulting to 30s on an unparseable value.
    pub fn cycle_interval(&self) -> Duration {
        parse_duration(&self.cycle_interval).unwrap_or(Duration::from_secs(30))
    }
}

/// Client-facing directory surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryConfig {
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Address handed out when the available pool is empty. Clients always
    /// receive some address, never an error.
    pub backup_address: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            backup_address: "127.0.0.1:7777".to_string(),
        }
    }
}

/// Compute provisioner backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComputeConfig {
    /// Base URL of the HTTP provisioner (e.g. "http://127.0.0.1:9090").
    pub endpoint: String,
    /// Upper bound on a provision call, which blocks until the instance is
    /// confirmed running (e.g. "120s").
    #[serde(default = "default_provision_timeout")]
    pub provision_timeout: String,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9090".to_string(),
            provision_timeout: default_provision_timeout(),
        }
    }
}

impl ComputeConfig {
    /// Parsed provision timeout, defaulting to 120s on an unparseable value.
    pub fn provision_timeout(&self) -> Duration {
        parse_duration(&self.provision_timeout).unwrap_or(Duration::from_secs(120))
    }
}

/// Health probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// HTTP path of the instance health endpoint.
    #[serde(default = "default_health_path")]
    pub path: String,
    /// Timeout per probe (e.g. "2s").
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: String,
    /// Consecutive probe failures before a server is flagged stale.
    #[serde(default = "default_stale_threshold")]
    pub stale_threshold: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            path: default_health_path(),
            probe_timeout: default_probe_timeout(),
            stale_threshold: default_stale_threshold(),
        }
    }
}

impl HealthConfig {
    /// Parsed probe timeout, defaulting to 2s on an unparseable value.
    pub fn probe_timeout(&self) -> Duration {
        parse_duration(&self.probe_timeout).unwrap_or(Duration::from_secs(2))
    }
}

fn default_cycle_interval() -> String {
    "30s".to_string()
}

fn default_listen_port() -> u16 {
    8080
}

fn default_provision_timeout() -> String {
    "120s".to_string()
}

fn default_health_path() -> String {
    "/health/".to_string()
}

fn default_probe_timeout() -> String {
    "2s".to_string()
}

fn default_stale_threshold() -> u32 {
    5
}

impl FlockConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: FlockConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Enforce the margin ordering contract.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scaling.downscale_margin <= self.scaling.upscale_margin {
            return Err(ConfigError::Margins {
                upscale: self.scaling.upscale_margin,
                downscale: self.scaling.downscale_margin,
            });
        }
        Ok(())
    }
}

/// Parse a duration string like "5s", "500ms", "2m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
