//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the fleet
//! controller. All types derive Serde traits for deserialization from config
//! files.

use serde::{Deserialize, Serialize};

use crate::perimeter::rule::SecurityRule;

/// Root configuration for the fleet controller.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FleetConfig {
    /// Capacity bounds and lifecycle timeouts.
    pub fleet: FleetSettings,

    /// Warm pool the provisioner draws instances from.
    pub provisioner: ProvisionerConfig,

    /// Scale decision engine: tick grain and threshold rules.
    pub scaler: ScalerConfig,

    /// Metric source settings.
    pub metric: MetricConfig,

    /// Health probe settings.
    pub probe: ProbeConfig,

    /// Backend pool settings.
    pub pool: PoolConfig,

    /// Retry policy for transient provisioning errors.
    pub retry: RetryConfig,

    /// Network perimeters, each an ordered rule set.
    pub perimeters: Vec<PerimeterConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Capacity bounds for the fleet.
///
/// Invariant at rest: `min <= size <= max`. Only an in-flight scale action
/// may transiently violate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleProfile {
    pub min: u32,
    pub default_size: u32,
    pub max: u32,
}

impl ScaleProfile {
    /// Clamp a desired capacity into `[min, max]`.
    pub fn clamp(&self, desired: u32) -> u32 {
        desired.clamp(self.min, self.max)
    }
}

/// Fleet capacity and lifecycle timeouts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FleetSettings {
    /// Minimum capacity.
    pub min: u32,

    /// Capacity established at startup.
    #[serde(rename = "default")]
    pub default_size: u32,

    /// Maximum capacity.
    pub max: u32,

    /// How long a provisioned instance may take to report ready.
    pub bootstrap_timeout_secs: u64,

    /// How long a draining instance may hold in-flight work.
    pub drain_timeout_secs: u64,
}

impl FleetSettings {
    pub fn profile(&self) -> ScaleProfile {
        ScaleProfile {
            min: self.min,
            default_size: self.default_size,
            max: self.max,
        }
    }
}

impl Default for FleetSettings {
    fn default() -> Self {
        Self {
            min: 1,
            default_size: 2,
            max: 5,
            bootstrap_timeout_secs: 300,
            drain_timeout_secs: 30,
        }
    }
}

/// Warm pool the shipped provisioner draws from.
///
/// Image and bootstrap provisioning proper is an external collaborator; the
/// shipped provisioner leases pre-configured addresses and treats the first
/// successful readiness response as the bootstrap signal.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// Candidate instance addresses (e.g., "10.0.1.4:8080").
    pub warm_pool: Vec<String>,

    /// Path polled until the instance reports ready.
    pub ready_path: String,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            warm_pool: Vec::new(),
            ready_path: "/ready".to_string(),
        }
    }
}

/// Direction of a scale action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleDirection {
    ScaleOut,
    ScaleIn,
}

impl ScaleDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleDirection::ScaleOut => "scale_out",
            ScaleDirection::ScaleIn => "scale_in",
        }
    }
}

/// Comparison operator for threshold rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum CompareOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
}

impl CompareOp {
    /// Evaluate `value <op> threshold`.
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            CompareOp::Gt => value > threshold,
            CompareOp::Ge => value >= threshold,
            CompareOp::Lt => value < threshold,
            CompareOp::Le => value <= threshold,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }
}

/// One threshold rule. Read-only at runtime.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScaleRule {
    /// Which way this rule scales.
    pub direction: ScaleDirection,

    /// Metric the rule evaluates (matched against the source's metric name).
    pub metric: String,

    /// Comparison operator.
    pub op: CompareOp,

    /// Threshold the windowed aggregate is compared against.
    pub threshold: f64,

    /// Sliding window the aggregate is computed over.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Minimum time between successive triggers of this direction.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Instances added or removed per trigger.
    #[serde(default = "default_step")]
    pub step: u32,
}

fn default_window_secs() -> u64 {
    300
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_step() -> u32 {
    1
}

/// Scale decision engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScalerConfig {
    /// Evaluation tick, also the metric polling grain.
    pub tick_secs: u64,

    /// Threshold rules, evaluated every tick.
    pub rules: Vec<ScaleRule>,
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            tick_secs: 60,
            rules: vec![
                ScaleRule {
                    direction: ScaleDirection::ScaleOut,
                    metric: "cpu".to_string(),
                    op: CompareOp::Gt,
                    threshold: 75.0,
                    window_secs: 300,
                    cooldown_secs: 60,
                    step: 1,
                },
                ScaleRule {
                    direction: ScaleDirection::ScaleIn,
                    metric: "cpu".to_string(),
                    op: CompareOp::Lt,
                    threshold: 25.0,
                    window_secs: 300,
                    cooldown_secs: 60,
                    step: 1,
                },
            ],
        }
    }
}

/// Metric source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricConfig {
    /// Metric name the source reports.
    pub name: String,

    /// Initial value for the simulated source.
    pub initial: f64,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            name: "cpu".to_string(),
            initial: 0.0,
        }
    }
}

/// Health probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Path to probe on each Running instance.
    pub path: String,

    /// Probe interval in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,

    /// Status code counted as a success.
    pub expect_status: u16,

    /// Consecutive failures before marking Unhealthy.
    pub unhealthy_threshold: u32,

    /// Consecutive successes before marking Healthy.
    pub healthy_threshold: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            path: "/health".to_string(),
            interval_secs: 30,
            timeout_secs: 5,
            expect_status: 200,
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// Distribution strategy over the eligible set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Deterministic rotation for a fixed eligible set. The default.
    RoundRobin,
    /// Fewest active connections wins; first wins ties.
    LeastConnections,
}

/// Backend pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    pub strategy: StrategyKind,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::RoundRobin,
        }
    }
}

/// Retry policy for transient provisioning errors.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts before degrading.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// One named perimeter: an ordered rule set with an implicit trailing Deny.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PerimeterConfig {
    /// Perimeter identifier (e.g., "edge", "compute").
    pub name: String,

    /// Admission rules, evaluated lowest priority number first.
    pub rules: Vec<SecurityRule>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
