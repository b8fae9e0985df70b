//! flock-pool — the autoscaling core of flock.
//!
//! Owns the available/standby server pools and drives the periodic
//! control cycle:
//!
//! ```text
//! ServerManager (singleton background task)
//!   └── one cycle, under a single coarse lock:
//!       ├── probe   — concurrent health probes, both pools
//!       ├── decide  — pure scaling policy over the aggregate capacity
//!       │     Up:   revive longest-standby server, else provision
//!       │     Down: drain the least-loaded available server
//!       └── reap    — deprovision standby servers that report ready_to_close
//! ```
//!
//! Client-facing operations (assignment selection, add-server-now, listing)
//! take the same lock, so they never interleave with an in-flight cycle.
//! Every per-cycle error is contained and logged; the loop never exits on
//! error.

pub mod error;
pub mod manager;
pub mod policy;
pub mod pool;

pub use error::PoolError;
pub use manager::ServerManager;
pub use policy::{ScaleDecision, decide};
pub use pool::PoolState;
