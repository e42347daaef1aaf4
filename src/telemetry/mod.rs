//! Metric ingestion subsystem.
//!
//! # Data Flow
//! ```text
//! Scheduler tick (scaler)
//!     → source.rs (poll one sample per eligible instance)
//!     → window.rs (record, prune expired samples)
//!     → windowed mean feeds the scale decision engine
//! ```
//!
//! # Design Decisions
//! - The source is a trait seam; production wires a real collector, tests
//!   and demos use the simulated source
//! - Samples are immutable once recorded and live only for the window
//! - Instances outside Running+Healthy contribute nothing to the aggregate

pub mod source;
pub mod window;

pub use source::{MetricSample, MetricSource, SimulatedMetricSource};
pub use window::MetricWindow;
