//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → FleetConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On reload signal:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → perimeter rule sets swapped atomically
//!     → everything else requires a restart
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - An invalid perimeter rule set is fatal at load (fail closed)

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::FleetConfig;
pub use schema::ProbeConfig;
pub use schema::RetryConfig;
pub use schema::ScaleDirection;
pub use schema::ScaleProfile;
pub use schema::ScaleRule;
