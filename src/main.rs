//! Fleet Control (v1)
//!
//! A closed-loop fleet controller built with Tokio.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────┐    ┌───────────────────┐    ┌──────────────────┐
//!   │ MetricSource │───▶│ ScaleDecision     │───▶│ FleetController  │
//!   │ (telemetry)  │    │ Engine (scaler)   │    │ (fleet)          │
//!   └──────────────┘    └───────────────────┘    └────────┬─────────┘
//!                                                          │ register /
//!                                                          │ drain
//!   ┌──────────────┐    probe results               ┌──────▼─────────┐
//!   │ HealthProbe  │─────────────────────────────▶ │  BackendPool    │
//!   │ (health)     │                                │  (pool)        │
//!   └──────────────┘                                └────────────────┘
//!
//!   SecurityPerimeter (perimeter) sits orthogonally in front of every
//!   network path, consulted per connection attempt.
//!
//!   Cross-cutting: config, observability, resilience, lifecycle, admin.
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use fleet_control::admin::{run_admin, AdminState};
use fleet_control::config::loader::load_config;
use fleet_control::config::schema::PerimeterConfig;
use fleet_control::config::watcher::ConfigWatcher;
use fleet_control::config::FleetConfig;
use fleet_control::fleet::{AddressPoolProvisioner, FleetController, FleetRoster};
use fleet_control::health::HealthProbe;
use fleet_control::lifecycle::{signals, Shutdown};
use fleet_control::observability::{logging, metrics};
use fleet_control::perimeter::PerimeterSet;
use fleet_control::pool::BackendPool;
use fleet_control::scaler::engine::ScaleDecisionEngine;
use fleet_control::telemetry::source::{MetricSource, SimulatedMetricSource};

/// Decision log entries retained for the admin API.
const DECISION_LOG_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration; an invalid rule set never starts (fail closed).
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => FleetConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!("fleet-control v0.1.0 starting");
    tracing::info!(
        min = config.fleet.min,
        default = config.fleet.default_size,
        max = config.fleet.max,
        tick_secs = config.scaler.tick_secs,
        probe_interval_secs = config.probe.interval_secs,
        perimeters = config.perimeters.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Arc::new(Shutdown::new());

    // Core state: perimeters, roster, pool.
    let perimeters = Arc::new(PerimeterSet::from_config(
        &config.perimeters,
        DECISION_LOG_CAPACITY,
    )?);
    let roster = Arc::new(FleetRoster::new());
    let pool = Arc::new(BackendPool::new(config.pool.strategy));

    // Control loop components.
    let provisioner = Arc::new(AddressPoolProvisioner::new(&config.provisioner));
    let controller = Arc::new(FleetController::new(
        roster.clone(),
        pool.clone(),
        provisioner,
        &config.fleet,
        config.retry.clone(),
    ));
    let engine = ScaleDecisionEngine::new(&config.scaler, config.fleet.profile());
    let last_action = engine.last_action();
    let source = Arc::new(SimulatedMetricSource::new(
        config.metric.name.clone(),
        config.metric.initial,
    ));

    // Bring the fleet to its default capacity before any loop starts.
    let established = controller.establish_default().await;
    tracing::info!(established, "Default capacity established");

    let (intent_tx, intent_rx) = mpsc::channel(8);
    let mut tasks = Vec::new();

    tasks.push(tokio::spawn(engine.run(
        roster.clone(),
        source.clone() as Arc<dyn MetricSource>,
        config.metric.name.clone(),
        intent_tx,
        shutdown.subscribe(),
    )));
    tasks.push(tokio::spawn(
        controller.clone().run(intent_rx, shutdown.subscribe()),
    ));

    let probe = Arc::new(HealthProbe::new(roster.clone(), config.probe.clone()));
    tasks.push(tokio::spawn(probe.run(shutdown.clone())));

    if config.admin.enabled {
        let state = AdminState {
            roster: roster.clone(),
            pool: pool.clone(),
            perimeters: perimeters.clone(),
            last_action,
            profile: config.fleet.profile(),
            api_key: config.admin.api_key.clone(),
        };
        let bind = config.admin.bind_address.clone();
        let shutdown_admin = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = run_admin(state, bind, shutdown_admin).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        }));
    }

    // Hot reload: file watcher and SIGHUP both feed the perimeter swap.
    let (sighup_tx, mut sighup_rx) = mpsc::unbounded_channel();
    tasks.push(tokio::spawn(signals::listen(shutdown.clone(), sighup_tx)));

    // Keep the watcher alive for the life of the process.
    let _watcher = match &config_path {
        Some(path) => {
            let (watcher, mut update_rx) = ConfigWatcher::new(path);
            let handle = watcher.run()?;

            let perimeters = perimeters.clone();
            let path = path.clone();
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        maybe_config = update_rx.recv() => match maybe_config {
                            Some(new_config) => {
                                apply_perimeters(&perimeters, &new_config.perimeters);
                            }
                            None => break,
                        },
                        maybe_hup = sighup_rx.recv() => match maybe_hup {
                            Some(()) => match load_config(&path) {
                                Ok(new_config) => {
                                    apply_perimeters(&perimeters, &new_config.perimeters);
                                }
                                Err(e) => {
                                    tracing::error!(
                                        "Reload on SIGHUP failed: {}. Keeping current configuration.",
                                        e
                                    );
                                }
                            },
                            None => break,
                        },
                    }
                }
            }));
            Some(handle)
        }
        None => {
            tasks.push(tokio::spawn(async move {
                while sighup_rx.recv().await.is_some() {
                    tracing::warn!("SIGHUP received but no config file was given, nothing to reload");
                }
            }));
            None
        }
    };

    // Block until a shutdown-class signal fans out.
    let mut shutdown_rx = shutdown.subscribe();
    let _ = shutdown_rx.recv().await;

    for task in tasks {
        let _ = tokio::time::timeout(Duration::from_secs(5), task).await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn apply_perimeters(perimeters: &PerimeterSet, configs: &[PerimeterConfig]) {
    if let Err(e) = perimeters.reload(configs) {
        tracing::error!(error = %e, "Perimeter reload rejected, keeping current rule set");
    }
}
