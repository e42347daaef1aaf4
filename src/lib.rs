//! Fleet Control Core Library

pub mod config;
pub mod error;
pub mod fleet;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod perimeter;
pub mod pool;
pub mod resilience;
pub mod scaler;
pub mod telemetry;
pub mod admin;

pub use config::FleetConfig;
pub use fleet::FleetController;
pub use lifecycle::Shutdown;
pub use perimeter::PerimeterSet;
