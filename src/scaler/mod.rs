//! Scale decision subsystem.
//!
//! # Data Flow
//! ```text
//! Tick (fixed grain)
//!     → telemetry: one sample per Running+Healthy instance
//!     → windowed mean per rule window
//!     → rules.rs: threshold + cooldown gating
//!     → engine.rs: ScaleOut precedence, clamp to [min, max]
//!     → ScaleIntent onto the controller's queue
//! ```
//!
//! # Design Decisions
//! - Rules are configuration records consumed by the engine, never code
//! - Cooldowns are per direction; the opposite direction stays evaluable
//! - Intents carry an identity token so redelivery is idempotent

pub mod engine;
pub mod rules;

pub use engine::ScaleDecisionEngine;
pub use rules::{LastAction, ScaleIntent};
