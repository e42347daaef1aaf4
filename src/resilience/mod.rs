//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Provisioning call:
//!     → On transient failure: retry with backoff.rs (jittered exponential)
//!     → Attempts bounded by RetryConfig.max_attempts
//!     → Exhaustion degrades the fleet (logged + metric), never panics
//! ```
//!
//! # Design Decisions
//! - Jittered backoff prevents thundering herd against the provisioning API
//! - Only errors classified transient are retried

pub mod backoff;
