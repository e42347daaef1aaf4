//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, bounds ordered)
//! - Reject ambiguous perimeter rule sets (duplicate priorities)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FleetConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system; the process never
//!   starts with an invalid perimeter (fail closed)

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::FleetConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Capacity bounds are not ordered `min <= default <= max`.
    CapacityBounds { min: u32, default: u32, max: u32 },

    /// A scale rule carries an unusable value.
    BadScaleRule { index: usize, detail: String },

    /// A timing knob is zero where a positive value is required.
    ZeroInterval { field: &'static str },

    /// A probe threshold must be at least one.
    BadProbeThreshold { field: &'static str },

    /// A warm pool address failed to parse.
    BadWarmPoolAddress { address: String },

    /// Warm pool cannot cover the configured maximum capacity.
    WarmPoolTooSmall { pool: usize, max: u32 },

    /// Two perimeters share a name.
    DuplicatePerimeterName { name: String },

    /// Two rules within one perimeter share a priority.
    DuplicateRulePriority { perimeter: String, priority: u32 },

    /// Admin API enabled with the placeholder key.
    PlaceholderAdminKey,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::CapacityBounds { min, default, max } => write!(
                f,
                "capacity bounds must satisfy min <= default <= max (got {}/{}/{})",
                min, default, max
            ),
            ValidationError::BadScaleRule { index, detail } => {
                write!(f, "scale rule #{}: {}", index, detail)
            }
            ValidationError::ZeroInterval { field } => {
                write!(f, "{} must be greater than zero", field)
            }
            ValidationError::BadProbeThreshold { field } => {
                write!(f, "{} must be at least 1", field)
            }
            ValidationError::BadWarmPoolAddress { address } => {
                write!(f, "invalid warm pool address: {}", address)
            }
            ValidationError::WarmPoolTooSmall { pool, max } => write!(
                f,
                "warm pool holds {} addresses but max capacity is {}",
                pool, max
            ),
            ValidationError::DuplicatePerimeterName { name } => {
                write!(f, "duplicate perimeter name: {}", name)
            }
            ValidationError::DuplicateRulePriority { perimeter, priority } => write!(
                f,
                "perimeter '{}': duplicate rule priority {}",
                perimeter, priority
            ),
            ValidationError::PlaceholderAdminKey => {
                write!(f, "admin API enabled with the placeholder api_key")
            }
        }
    }
}

/// Validate a parsed configuration. Collects every error rather than
/// stopping at the first.
pub fn validate_config(config: &FleetConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let fleet = &config.fleet;
    if !(fleet.min <= fleet.default_size && fleet.default_size <= fleet.max) {
        errors.push(ValidationError::CapacityBounds {
            min: fleet.min,
            default: fleet.default_size,
            max: fleet.max,
        });
    }
    if fleet.max == 0 {
        errors.push(ValidationError::ZeroInterval { field: "fleet.max" });
    }
    if fleet.drain_timeout_secs == 0 {
        errors.push(ValidationError::ZeroInterval {
            field: "fleet.drain_timeout_secs",
        });
    }
    if fleet.bootstrap_timeout_secs == 0 {
        errors.push(ValidationError::ZeroInterval {
            field: "fleet.bootstrap_timeout_secs",
        });
    }

    if config.scaler.tick_secs == 0 {
        errors.push(ValidationError::ZeroInterval {
            field: "scaler.tick_secs",
        });
    }
    for (i, rule) in config.scaler.rules.iter().enumerate() {
        if rule.step == 0 {
            errors.push(ValidationError::BadScaleRule {
                index: i,
                detail: "step must be at least 1".to_string(),
            });
        }
        if rule.window_secs == 0 {
            errors.push(ValidationError::BadScaleRule {
                index: i,
                detail: "window_secs must be greater than zero".to_string(),
            });
        }
        if rule.metric.is_empty() {
            errors.push(ValidationError::BadScaleRule {
                index: i,
                detail: "metric name is empty".to_string(),
            });
        }
        if !rule.threshold.is_finite() {
            errors.push(ValidationError::BadScaleRule {
                index: i,
                detail: "threshold must be finite".to_string(),
            });
        }
    }

    if config.probe.interval_secs == 0 {
        errors.push(ValidationError::ZeroInterval {
            field: "probe.interval_secs",
        });
    }
    if config.probe.timeout_secs == 0 {
        errors.push(ValidationError::ZeroInterval {
            field: "probe.timeout_secs",
        });
    }
    if config.probe.unhealthy_threshold == 0 {
        errors.push(ValidationError::BadProbeThreshold {
            field: "probe.unhealthy_threshold",
        });
    }
    if config.probe.healthy_threshold == 0 {
        errors.push(ValidationError::BadProbeThreshold {
            field: "probe.healthy_threshold",
        });
    }

    for addr in &config.provisioner.warm_pool {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::BadWarmPoolAddress {
                address: addr.clone(),
            });
        }
    }
    if (config.provisioner.warm_pool.len() as u32) < fleet.max {
        errors.push(ValidationError::WarmPoolTooSmall {
            pool: config.provisioner.warm_pool.len(),
            max: fleet.max,
        });
    }

    let mut perimeter_names = HashSet::new();
    for perimeter in &config.perimeters {
        if !perimeter_names.insert(perimeter.name.clone()) {
            errors.push(ValidationError::DuplicatePerimeterName {
                name: perimeter.name.clone(),
            });
        }
        let mut priorities = HashSet::new();
        for rule in &perimeter.rules {
            if !priorities.insert(rule.priority) {
                errors.push(ValidationError::DuplicateRulePriority {
                    perimeter: perimeter.name.clone(),
                    priority: rule.priority,
                });
            }
        }
    }

    if config.admin.enabled && config.admin.api_key == "CHANGE_ME_IN_PRODUCTION" {
        errors.push(ValidationError::PlaceholderAdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{FleetConfig, PerimeterConfig};
    use crate::perimeter::rule::SecurityRule;

    fn valid_config() -> FleetConfig {
        let mut config = FleetConfig::default();
        config.provisioner.warm_pool = (0..5)
            .map(|i| format!("127.0.0.1:{}", 9000 + i))
            .collect();
        config
    }

    #[test]
    fn default_config_with_pool_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn unordered_bounds_rejected() {
        let mut config = valid_config();
        config.fleet.min = 4;
        config.fleet.default_size = 2;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::CapacityBounds { .. })));
    }

    #[test]
    fn duplicate_rule_priority_rejected() {
        let mut config = valid_config();
        let rule: SecurityRule = toml::from_str(
            r#"
            priority = 100
            direction = "inbound"
            action = "allow"
            protocol = "tcp"
            ports = "80"
            source = "*"
            destination = "*"
            "#,
        )
        .unwrap();
        config.perimeters.push(PerimeterConfig {
            name: "edge".to_string(),
            rules: vec![rule.clone(), rule],
        });

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::DuplicateRulePriority { priority: 100, .. }
        )));
    }

    #[test]
    fn small_warm_pool_rejected() {
        let mut config = valid_config();
        config.provisioner.warm_pool.truncate(2);

        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::WarmPoolTooSmall { pool: 2, max: 5 })));
    }

    #[test]
    fn zero_step_rejected() {
        let mut config = valid_config();
        config.scaler.rules[0].step = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::BadScaleRule { index: 0, .. })));
    }
}
