//! Fleet-level error taxonomy.
//!
//! Configuration errors live in `config::loader`; everything that can go
//! wrong after startup is here. Transient errors are retryable, the rest
//! resolve into a terminal instance state or a logged, non-fatal event.
//! Probe timeouts are not errors at this level: they count toward an
//! instance's failure streak (see `health::state`) and are never surfaced
//! individually.

use std::time::Duration;

use uuid::Uuid;

/// Errors surfaced by fleet operations.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    /// Provisioning collaborator failed in a way worth retrying.
    #[error("transient provisioning error: {0}")]
    TransientProvisioning(String),

    /// Instance did not report ready within the bootstrap timeout.
    #[error("instance {id} did not become ready within {timeout:?}")]
    BootstrapTimeout { id: Uuid, timeout: Duration },

    /// An intent would have pushed capacity past a configured bound.
    /// Clamped and logged, never fatal.
    #[error("scale intent clamped: requested {requested}, bound {bound}")]
    BoundViolation { requested: u32, bound: u32 },

    /// In-flight work did not finish within the drain timeout.
    #[error("instance {id} drain timed out after {timeout:?}, forcing termination")]
    DrainTimeout { id: Uuid, timeout: Duration },

    /// Provisioning gave up after exhausting its retry budget.
    #[error("provisioning failed after {attempts} attempts: {last_error}")]
    ProvisioningExhausted { attempts: u32, last_error: String },
}

impl FleetError {
    /// Whether the error should be retried with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, FleetError::TransientProvisioning(_))
    }
}

/// Errors raised while building a perimeter from configuration.
///
/// These are fatal at load time: an ambiguous rule set must never silently
/// default to Allow.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PerimeterError {
    #[error("perimeter '{perimeter}': duplicate rule priority {priority}")]
    DuplicateRulePriority { perimeter: String, priority: u32 },
}
