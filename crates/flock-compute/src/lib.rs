//! flock-compute — the compute provisioning collaborator contract.
//!
//! The pool controller never talks to a cloud backend directly; it goes
//! through the `ComputeProvider` trait:
//!
//! - `provision()` — launch one instance and block (bounded by a timeout)
//!   until it is confirmed running, returning its handle and address
//! - `deprovision()` — request termination of a drained instance
//! - `list_running()` — enumerate already-running instances, used once at
//!   startup to adopt an existing fleet
//!
//! `HttpProvider` is the production implementation, a thin http1 client
//! for an HTTP provisioner service. Tests substitute in-memory providers.

pub mod error;
pub mod provider;

pub use error::ComputeError;
pub use provider::{ComputeProvider, HttpProvider, Launched};
