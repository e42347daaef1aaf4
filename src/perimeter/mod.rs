//! Network perimeter subsystem.
//!
//! # Data Flow
//! ```text
//! Config rule sets
//!     → engine.rs (compile, sort, validate priorities)
//!     → immutable Perimeter snapshots behind arc-swap
//!
//! Connection attempt
//!     → engine.rs evaluate (first match wins, implicit Deny)
//!     → audit.rs (decision log) + metrics
//! ```
//!
//! # Design Decisions
//! - Evaluation is pure and side-effect-free over a snapshot
//! - Rule-set updates swap the snapshot, never mutate in place
//! - Misconfiguration (duplicate priority) is fatal at load

pub mod audit;
pub mod engine;
pub mod rule;

pub use engine::{AccessRequest, Perimeter, PerimeterSet};
pub use rule::{Action, Direction, Protocol};
