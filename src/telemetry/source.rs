//! Metric source seam.

use std::time::Instant;

use dashmap::DashMap;
use uuid::Uuid;

use crate::fleet::instance::Instance;

/// One utilization sample. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSample {
    pub instance: Uuid,
    pub at: Instant,
    pub value: f64,
}

/// Supplies periodic utilization samples per instance, polled at the
/// scheduler's grain.
pub trait MetricSource: Send + Sync {
    /// Sample one metric for one instance. None when the source has no
    /// reading (the instance simply contributes nothing this tick).
    fn sample(&self, metric: &str, instance: &Instance) -> Option<MetricSample>;
}

/// Simulated source for demos and tests: one fleet-wide value with optional
/// per-instance overrides, settable at runtime.
#[derive(Debug)]
pub struct SimulatedMetricSource {
    metric: String,
    fleet_value: std::sync::atomic::AtomicU64,
    overrides: DashMap<Uuid, f64>,
}

impl SimulatedMetricSource {
    pub fn new(metric: impl Into<String>, initial: f64) -> Self {
        Self {
            metric: metric.into(),
            fleet_value: std::sync::atomic::AtomicU64::new(initial.to_bits()),
            overrides: DashMap::new(),
        }
    }

    /// Set the fleet-wide value returned for every instance.
    pub fn set_value(&self, value: f64) {
        self.fleet_value
            .store(value.to_bits(), std::sync::atomic::Ordering::Relaxed);
    }

    pub fn value(&self) -> f64 {
        f64::from_bits(self.fleet_value.load(std::sync::atomic::Ordering::Relaxed))
    }

    /// Pin one instance to its own value.
    pub fn set_instance_value(&self, instance: Uuid, value: f64) {
        self.overrides.insert(instance, value);
    }

    pub fn clear_instance_value(&self, instance: Uuid) {
        self.overrides.remove(&instance);
    }
}

impl MetricSource for SimulatedMetricSource {
    fn sample(&self, metric: &str, instance: &Instance) -> Option<MetricSample> {
        if metric != self.metric {
            return None;
        }
        let value = self
            .overrides
            .get(&instance.id)
            .map(|v| *v)
            .unwrap_or_else(|| self.value());
        Some(MetricSample {
            instance: instance.id,
            at: Instant::now(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn override_beats_fleet_value() {
        let source = SimulatedMetricSource::new("cpu", 40.0);
        let a = Arc::new(Instance::new("127.0.0.1:9001".parse().unwrap(), 0));
        let b = Arc::new(Instance::new("127.0.0.1:9002".parse().unwrap(), 1));

        source.set_instance_value(a.id, 95.0);

        assert_eq!(source.sample("cpu", &a).unwrap().value, 95.0);
        assert_eq!(source.sample("cpu", &b).unwrap().value, 40.0);
    }

    #[test]
    fn unknown_metric_yields_nothing() {
        let source = SimulatedMetricSource::new("cpu", 40.0);
        let a = Arc::new(Instance::new("127.0.0.1:9001".parse().unwrap(), 0));
        assert!(source.sample("memory", &a).is_none());
    }
}
