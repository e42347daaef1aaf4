//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Initialize subsystems → Start loops
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast to all loops → tasks drain and exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Trigger config reload (perimeter rules)
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then background loops
//! - Shutdown fans out over one broadcast channel

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
