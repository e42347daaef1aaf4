//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define fleet metrics (size, eligibility, scale actions, perimeter
//!   decisions)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `fleet_size` (gauge): instances counting toward capacity
//! - `fleet_eligible_backends` (gauge): current traffic-eligible set size
//! - `fleet_scale_intents_total` (counter): emitted intents by direction
//! - `fleet_bound_violations_total` (counter): clamped intents by direction
//! - `fleet_bootstrap_timeouts_total` (counter): instances that never
//!   reported ready
//! - `fleet_forced_drains_total` (counter): drains cut at the timeout
//! - `fleet_degraded_total` (counter): provisioning retry exhaustion
//! - `instance_health` (gauge): 1=healthy, 0=unhealthy, by address
//! - `perimeter_decisions_total` (counter): by perimeter and action

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::schema::ScaleDirection;
use crate::perimeter::rule::Action;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_fleet_size(size: u32) {
    gauge!("fleet_size").set(size as f64);
}

pub fn record_eligible_backends(count: usize) {
    gauge!("fleet_eligible_backends").set(count as f64);
}

pub fn record_scale_intent(direction: ScaleDirection) {
    counter!("fleet_scale_intents_total", "direction" => direction.as_str()).increment(1);
}

pub fn record_bound_violation(direction: ScaleDirection) {
    counter!("fleet_bound_violations_total", "direction" => direction.as_str()).increment(1);
}

pub fn record_bootstrap_timeout() {
    counter!("fleet_bootstrap_timeouts_total").increment(1);
}

pub fn record_forced_drain() {
    counter!("fleet_forced_drains_total").increment(1);
}

pub fn record_fleet_degraded() {
    counter!("fleet_degraded_total").increment(1);
}

pub fn record_instance_health(addr: &str, healthy: bool) {
    gauge!("instance_health", "addr" => addr.to_string()).set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_perimeter_decision(perimeter: &str, action: Action) {
    let action = match action {
        Action::Allow => "allow",
        Action::Deny => "deny",
    };
    counter!("perimeter_decisions_total", "perimeter" => perimeter.to_string(), "action" => action)
        .increment(1);
}
