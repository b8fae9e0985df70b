//! Pool state — the available and standby server sets.
//!
//! Mutated only by `ServerManager` under its lock. The standby set is a
//! FIFO queue so scale-up revives the longest-standing standby server
//! first. The cached aggregate capacity is recomputed every cycle after
//! the probe phase and never trusted across a cycle boundary.

use std::collections::VecDeque;

use flock_core::{FleetSnapshot, PoolKind, Server, ServerId, ServerSnapshot, ServerStatus};

use crate::error::PoolError;

/// The available/standby pools plus the cached aggregate capacity.
#[derive(Debug, Default)]
pub struct PoolState {
    /// Servers eligible for client assignment.
    available: Vec<Server>,
    /// Servers draining prior to termination, longest-standby first.
    standby: VecDeque<Server>,
    /// Cached sum of `available_capacity` over the available pool only.
    total_available_capacity: u64,
}

impl PoolState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a server to the available pool.
    pub fn push_available(&mut self, server: Server) {
        self.total_available_capacity += u64::from(server.available_capacity);
        self.available.push(server);
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn standby_count(&self) -> usize {
        self.standby.len()
    }

    /// Cached aggregate capacity of the available pool.
    pub fn total_capacity(&self) -> u64 {
        self.total_available_capacity
    }

    /// Recompute the aggregate from the available pool. Called once per
    /// cycle after the probe phase.
    pub fn recompute_capacity(&mut self) -> u64 {
        self.total_available_capacity = self
            .available
            .iter()
            .map(|s| u64::from(s.available_capacity))
            .sum();
        self.total_available_capacity
    }

    /// `(id, address)` pairs for every server in both pools.
    pub fn probe_targets(&self) -> Vec<(ServerId, String)> {
        self.available
            .iter()
            .chain(self.standby.iter())
            .map(|s| (s.id.clone(), s.address.clone()))
            .collect()
    }

    /// Look up a server in either pool.
    pub fn find_mut(&mut self, id: &str) -> Option<&mut Server> {
        self.available
            .iter_mut()
            .chain(self.standby.iter_mut())
            .find(|s| s.id == id)
    }

    /// Select the server with the greatest available capacity, decrement it
    /// by one as local bookkeeping, and return its address.
    ///
    /// Ties break to the first-encountered server. The decrement saturates
    /// at zero and deliberately leaves the cached aggregate untouched; the
    /// next probe phase restores truth.
    pub fn take_assignment(&mut self) -> Result<String, PoolError> {
        let mut best: Option<usize> = None;
        for (i, server) in self.available.iter().enumerate() {
            match best {
                Some(b) if server.available_capacity <= self.available[b].available_capacity => {}
                _ => best = Some(i),
            }
        }

        let index = best.ok_or(PoolError::NoServerAvailable)?;
        let server = &mut self.available[index];
        server.available_capacity = server.available_capacity.saturating_sub(1);
        Ok(server.address.clone())
    }

    /// Move the least-loaded available server to the back of standby,
    /// subtracting its capacity from the cached aggregate.
    ///
    /// Returns `None` when the available pool is empty. Draining the
    /// least-loaded instance first minimizes disruption to live clients.
    pub fn demote_least_loaded(&mut self) -> Option<ServerId> {
        let mut victim: Option<usize> = None;
        for (i, server) in self.available.iter().enumerate() {
            match victim {
                Some(v) if server.available_capacity >= self.available[v].available_capacity => {}
                _ => victim = Some(i),
            }
        }

        let index = victim?;
        let server = self.available.remove(index);
        self.total_available_capacity = self
            .total_available_capacity
            .saturating_sub(u64::from(server.available_capacity));
        let id = server.id.clone();
        self.standby.push_back(server);
        Some(id)
    }

    /// Move the longest-standing standby server back into the available
    /// pool, adding its capacity to the cached aggregate.
    pub fn promote_longest_standby(&mut self) -> Option<ServerId> {
        let server = self.standby.pop_front()?;
        let id = server.id.clone();
        self.total_available_capacity += u64::from(server.available_capacity);
        self.available.push(server);
        Some(id)
    }

    /// Remove and return every standby server that reports ready to close.
    /// Servers still draining stay queued for the next cycle.
    pub fn reap_ready(&mut self) -> Vec<Server> {
        let mut reaped = Vec::new();
        self.standby.retain_mut(|server| {
            if server.ready_to_close {
                let mut done = server.clone();
                done.status = ServerStatus::Stopped;
                reaped.push(done);
                false
            } else {
                true
            }
        });
        reaped
    }

    /// Addresses of every available server.
    pub fn available_addresses(&self) -> Vec<String> {
        self.available.iter().map(|s| s.address.clone()).collect()
    }

    /// Operator-facing view of both pools.
    pub fn snapshot(&self, stale_threshold: u32) -> FleetSnapshot {
        let view = |server: &Server, pool: PoolKind| ServerSnapshot {
            id: server.id.clone(),
            address: server.address.clone(),
            pool,
            available_capacity: server.available_capacity,
            ready_to_close: server.ready_to_close,
            stale: server.is_stale(stale_threshold),
        };

        let servers = self
            .available
            .iter()
            .map(|s| view(s, PoolKind::Available))
            .chain(self.standby.iter().map(|s| view(s, PoolKind::Standby)))
            .collect();

        FleetSnapshot {
            total_available_capacity: self.total_available_capacity,
            servers,
        }
    }
}
