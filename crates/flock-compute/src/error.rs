//! Compute provider error types.

use std::time::Duration;

use thiserror::Error;

/// Errors from the compute provisioning backend.
///
/// Provisioning failures are retried on the next control-loop cycle, never
/// inline. Deprovisioning failures are logged and the instance is dropped
/// from bookkeeping; it may leak at the provider and is reconciled
/// externally.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("provisioning failed: {0}")]
    Provision(String),

    #[error("instance not confirmed running within {0:?}")]
    ProvisionTimeout(Duration),

    #[error("deprovisioning failed: {0}")]
    Deprovision(String),

    #[error("failed to list running instances: {0}")]
    List(String),
}
