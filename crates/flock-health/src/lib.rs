//! flock-health — health probe client for flock.
//!
//! One probe = one HTTP GET against a server's health endpoint, decoding
//! `{"available_capacity": u32, "ready_to_close": bool}` into a
//! [`flock_core::HealthReport`]. Every failure mode — connect, request,
//! non-2xx status, malformed body, timeout — collapses into `ProbeError`,
//! which the pool controller treats as "no new information": last-known
//! server state is retained and a consecutive-failure counter drives the
//! operator-visible stale flag.

pub mod prober;

pub use prober::{HealthProber, ProbeError};
