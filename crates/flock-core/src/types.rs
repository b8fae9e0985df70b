//! Domain types for the flock fleet manager.
//!
//! A `Server` is one provisioned compute instance: an immutable identity
//! (provisioning handle + resolved address) plus the live state last
//! observed by a health probe. Live state is weakly consistent — the
//! staleness window is bounded by the control loop's cycle interval.

use serde::{Deserialize, Serialize};

/// Opaque provisioning handle for a server instance (e.g. a task ARN).
pub type ServerId = String;

/// Lifecycle status of a server instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    /// Waiting for the provisioning backend to report the instance running.
    Pending,
    /// Confirmed running; eligible for pool membership.
    Running,
    /// Deprovisioned. Never stored in a pool.
    Stopped,
}

/// Body returned by an instance's health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Remaining capacity for new client connections.
    pub available_capacity: u32,
    /// Whether the instance has drained and may be terminated.
    pub ready_to_close: bool,
}

/// One running server instance tracked by the pool controller.
///
/// `id` and `address` are fixed at construction. `available_capacity` and
/// `ready_to_close` are rewritten by probe application; `failed_probes`
/// counts consecutive probe failures for the operator-facing stale flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,
    /// `host:port` at which the instance accepts traffic and exposes health.
    pub address: String,
    pub status: ServerStatus,
    /// Last probed capacity; 0 until the first successful probe.
    pub available_capacity: u32,
    /// Last probed drain flag; false until the first successful probe.
    pub ready_to_close: bool,
    /// Consecutive failed probes since the last success.
    pub failed_probes: u32,
}

impl Server {
    /// Build a server from a confirmed-running instance.
    pub fn new(id: ServerId, address: String) -> Self {
        Self {
            id,
            address,
            status: ServerStatus::Running,
            available_capacity: 0,
            ready_to_close: false,
            failed_probes: 0,
        }
    }

    /// Apply a successful probe result, resetting the failure counter.
    pub fn apply_report(&mut self, report: HealthReport) {
        self.available_capacity = report.available_capacity;
        self.ready_to_close = report.ready_to_close;
        self.failed_probes = 0;
    }

    /// Record a failed probe. Last-known state is deliberately retained:
    /// one unreachable probe carries no new information.
    pub fn record_probe_failure(&mut self) {
        self.failed_probes = self.failed_probes.saturating_add(1);
    }

    /// Whether probes have failed at least `threshold` times in a row.
    pub fn is_stale(&self, threshold: u32) -> bool {
        threshold > 0 && self.failed_probes >= threshold
    }
}

/// Which pool a server currently belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    Available,
    Standby,
}

/// Operator-facing view of one tracked server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub id: ServerId,
    pub address: String,
    pub pool: PoolKind,
    pub available_capacity: u32,
    pub ready_to_close: bool,
    /// True once consecutive probe failures reach the configured threshold.
    pub stale: bool,
}

/// Operator-facing view of the whole fleet at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub total_available_capacity: u64,
    pub servers: Vec<ServerSnapshot>,
}
