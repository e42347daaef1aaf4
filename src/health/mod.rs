//! Health probing subsystem.
//!
//! # Data Flow
//! ```text
//! Per-instance probe loop (probe.rs):
//!     Periodic GET against the instance's probe path
//!     → classify outcome (state.rs)
//!     → streak counters on the instance
//!     → transition published via atomics (pool sees it on next read)
//! ```
//!
//! # Design Decisions
//! - Probes never trigger scale actions directly; an unhealthy instance
//!   merely drops out of the pool and the metric aggregate
//! - Transitions require consecutive successes/failures (hysteresis)
//! - One loop per instance, serialized per instance

pub mod probe;
pub mod state;

pub use probe::HealthProbe;
pub use state::ProbeOutcome;
