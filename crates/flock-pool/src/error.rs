//! Pool controller error types.

use thiserror::Error;

/// Errors from pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The available pool is empty. The directory surface absorbs this into
    /// the configured backup address; it never reaches an end client.
    #[error("no server available for assignment")]
    NoServerAvailable,

    /// A second `ServerManager` was constructed in the same process.
    /// Programming error in the wiring; fatal at startup.
    #[error("server manager already initialized")]
    AlreadyInitialized,

    #[error("compute backend error: {0}")]
    Compute(#[from] flock_compute::ComputeError),
}
