//! Server manager — pool controller and periodic control loop.
//!
//! The `ServerManager` is the single owner of pool state. One background
//! task drives the probe → decide → reap cycle; request handlers call the
//! client-facing operations (`assignment`, `list_available`,
//! `request_add_server_now`) concurrently. A single coarse lock held for
//! the whole cycle keeps every read/modify/write sequence mutually
//! exclusive — cycle frequency is seconds, not microseconds, so finer
//! locking buys nothing.
//!
//! The manager is a process-wide singleton: `init()` fails loudly on a
//! second construction rather than silently aliasing the first.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use flock_compute::ComputeProvider;
use flock_core::config::{FlockConfig, ScalingConfig};
use flock_core::{FleetSnapshot, Server};
use flock_health::HealthProber;

use crate::error::PoolError;
use crate::policy::{self, ScaleDecision};
use crate::pool::PoolState;

/// Process-wide construction guard.
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Owns the server pools and drives the autoscaling cycle.
pub struct ServerManager {
    pool: Mutex<PoolState>,
    compute: Arc<dyn ComputeProvider>,
    prober: HealthProber,
    scaling: ScalingConfig,
    backup_address: String,
    stale_threshold: u32,
    /// Guards out-of-band add-server attempts so a burst of concurrent
    /// requests provisions at most once.
    add_in_flight: AtomicBool,
}

impl ServerManager {
    /// Construct the process-wide manager.
    ///
    /// Fails with [`PoolError::AlreadyInitialized`] on a second call; a
    /// second manager would race the first over the same fleet.
    pub fn init(
        config: &FlockConfig,
        compute: Arc<dyn ComputeProvider>,
    ) -> Result<Arc<Self>, PoolError> {
        if INITIALIZED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PoolError::AlreadyInitialized);
        }
        Ok(Self::new_detached(config, compute))
    }

    /// Construct a manager without the process-wide singleton guard.
    ///
    /// For tests and embedding; production wiring goes through [`init`].
    pub fn new_detached(config: &FlockConfig, compute: Arc<dyn ComputeProvider>) -> Arc<Self> {
        let prober = HealthProber::new(
            config.health.path.clone(),
            config.health.probe_timeout(),
        );
        Arc::new(Self {
            pool: Mutex::new(PoolState::new()),
            compute,
            prober,
            scaling: config.scaling.clone(),
            backup_address: config.directory.backup_address.clone(),
            stale_threshold: config.health.stale_threshold,
            add_in_flight: AtomicBool::new(false),
        })
    }

    /// Seed the available pool with instances already running at the
    /// provider. Called once at startup.
    pub async fn adopt_running(&self) -> Result<usize, PoolError> {
        let running = self.compute.list_running().await?;
        let count = running.len();

        let mut pool = self.pool.lock().await;
        for launched in running {
            debug!(id = %launched.id, address = %launched.address, "adopting running server");
            pool.push_available(Server::new(launched.id, launched.address));
        }

        info!(adopted = count, "adopted already-running servers");
        Ok(count)
    }

    /// Run the control loop until the shutdown signal fires.
    ///
    /// Each iteration runs one full cycle, then sleeps the configured
    /// interval. Per-cycle errors are contained inside `run_cycle`; the
    /// loop itself never exits on error.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let interval = self.scaling.cycle_interval();
        info!(interval_secs = interval.as_secs(), "control loop started");

        loop {
            self.run_cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {
                    info!("control loop shutting down");
                    break;
                }
            }
        }
    }

    /// One full cycle: probe → decide → reap, under the pool lock
    /// end-to-end. Later phases depend only on state, never on earlier
    /// success, so the cycle always runs through reap.
    pub async fn run_cycle(&self) {
        let mut pool = self.pool.lock().await;

        // Probe phase: refresh live state for both pools.
        self.probe_phase(&mut pool).await;
        let total = pool.recompute_capacity();
        debug!(
            total,
            available = pool.available_count(),
            standby = pool.standby_count(),
            "probe phase complete"
        );

        // Decide phase.
        match policy::decide(total, pool.available_count(), &self.scaling) {
            ScaleDecision::Up => {
                if let Some(id) = pool.promote_longest_standby() {
                    info!(%id, total, "scale up: revived standby server");
                } else {
                    match self.compute.provision().await {
                        Ok(launched) => {
                            info!(
                                id = %launched.id,
                                address = %launched.address,
                                "scale up: provisioned new server"
                            );
                            pool.push_available(Server::new(launched.id, launched.address));
                        }
                        Err(e) => {
                            // Retried on the next cycle, never inline.
                            error!(error = %e, "scale up: provisioning failed");
                        }
                    }
                }
            }
            ScaleDecision::Down => {
                if let Some(id) = pool.demote_least_loaded() {
                    info!(%id, total, "scale down: moved server to standby");
                }
            }
            ScaleDecision::Hold => {
                debug!(total, "capacity within margins");
            }
        }

        // Reap phase: finalize deprovisioning for drained standby servers.
        for server in pool.reap_ready() {
            match self
                .compute
                .deprovision(&server.id, "drained after downscale")
                .await
            {
                Ok(()) => info!(id = %server.id, "deprovisioned standby server"),
                Err(e) => {
                    // Log-and-drop: the instance may leak at the provider
                    // and is reconciled externally.
                    error!(id = %server.id, error = %e, "deprovisioning failed; dropping server");
                }
            }
        }
    }

    /// Probe every server in both pools concurrently. Phase latency is
    /// bounded by the slowest single probe; each probe carries its own
    /// timeout.
    async fn probe_phase(&self, pool: &mut PoolState) {
        let mut probes = JoinSet::new();
        for (id, address) in pool.probe_targets() {
            let prober = self.prober.clone();
            probes.spawn(async move { (id, prober.probe(&address).await) });
        }

        while let Some(joined) = probes.join_next().await {
            let Ok((id, result)) = joined else { continue };
            let Some(server) = pool.find_mut(&id) else { continue };
            match result {
                Ok(report) => server.apply_report(report),
                Err(e) => {
                    // No new information: keep last-known state.
                    server.record_probe_failure();
                    debug!(%id, error = %e, failures = server.failed_probes, "health probe failed");
                    if server.failed_probes == self.stale_threshold {
                        warn!(%id, failures = server.failed_probes, "server flagged stale");
                    }
                }
            }
        }
    }

    /// Select a server address for a new client.
    ///
    /// Falls back to the configured backup address when the pool is empty;
    /// end clients always receive some address, never an error.
    pub async fn assignment(&self) -> String {
        let mut pool = self.pool.lock().await;
        match pool.take_assignment() {
            Ok(address) => address,
            Err(e) => {
                warn!(error = %e, backup = %self.backup_address, "falling back to backup address");
                self.backup_address.clone()
            }
        }
    }

    /// Addresses of every available server.
    pub async fn list_available(&self) -> Vec<String> {
        self.pool.lock().await.available_addresses()
    }

    /// Operator-facing snapshot of both pools.
    pub async fn snapshot(&self) -> FleetSnapshot {
        self.pool.lock().await.snapshot(self.stale_threshold)
    }

    /// Out-of-band request to grow the pool immediately.
    ///
    /// No-op when a cycle holds the pool lock or another add is already in
    /// flight: at most one provisioning call results from any burst of
    /// concurrent requests. Returns whether an attempt was made.
    pub async fn request_add_server_now(&self) -> bool {
        if self
            .add_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("add-server request ignored: another attempt in flight");
            return false;
        }

        let triggered = match self.pool.try_lock() {
            Ok(mut pool) => {
                match self.compute.provision().await {
                    Ok(launched) => {
                        info!(id = %launched.id, address = %launched.address, "added server on demand");
                        pool.push_available(Server::new(launched.id, launched.address));
                    }
                    Err(e) => error!(error = %e, "on-demand provisioning failed"),
                }
                true
            }
            Err(_) => {
                debug!("add-server request ignored: a cycle is in flight");
                false
            }
        };

        self.add_in_flight.store(false, Ordering::SeqCst);
        triggered
    }
}
