//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Metrics are cheap (atomic increments); safe on hot paths
//! - The perimeter decision log is separate (perimeter::audit) and serves
//!   the admin API rather than the scrape endpoint

pub mod logging;
pub mod metrics;
