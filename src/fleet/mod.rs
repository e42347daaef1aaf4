//! Fleet lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! Scale intent (from scaler)
//!     → controller.rs (serialize, re-validate, execute)
//!     → provisioner.rs (acquire address, await readiness)
//!     → instance.rs (lifecycle transitions, roster membership)
//!     → pool registration / drain-deregistration
//! ```
//!
//! # Design Decisions
//! - The roster is the single source of truth for fleet size and
//!   membership; all mutation funnels through the controller
//! - Lifecycle and health live on the instance as atomics with disjoint
//!   writers (controller and probe respectively)
//! - The provisioner is a trait seam so tests script the collaborator

pub mod controller;
pub mod instance;
pub mod provisioner;

pub use controller::FleetController;
pub use instance::{ConnectionGuard, FleetRoster, HealthState, Instance, InstanceState};
pub use provisioner::{AddressPoolProvisioner, ProvisionedInstance, Provisioner};
