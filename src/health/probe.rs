//! Active health probing.
//!
//! # Responsibilities
//! - Run one probe loop per Running instance
//! - Classify probe outcomes and drive streak counters
//! - Publish transitions (log + metrics); the pool sees them through the
//!   instance atomics
//!
//! Probes are parallel across instances but serialized per instance: each
//! loop awaits its own probe before sleeping for the next interval, so the
//! same instance is never probed twice concurrently.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use dashmap::DashMap;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::task::JoinHandle;
use tokio::time;
use uuid::Uuid;

use crate::config::schema::ProbeConfig;
use crate::fleet::instance::{FleetRoster, HealthState, Instance, InstanceState};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::health::state::ProbeOutcome;

/// Cadence at which the supervisor reconciles probe tasks with the roster.
const RECONCILE_INTERVAL: Duration = Duration::from_secs(1);

pub struct HealthProbe {
    roster: Arc<FleetRoster>,
    config: ProbeConfig,
    client: Client<HttpConnector, Body>,
    tasks: DashMap<Uuid, JoinHandle<()>>,
}

impl HealthProbe {
    pub fn new(roster: Arc<FleetRoster>, config: ProbeConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            roster,
            config,
            client,
            tasks: DashMap::new(),
        }
    }

    /// Supervise per-instance probe loops: spawn one for each Running
    /// instance, reap loops whose instance left Running.
    pub async fn run(self: Arc<Self>, shutdown: Arc<Shutdown>) {
        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            "Health probe starting"
        );

        let mut ticker = time::interval(RECONCILE_INTERVAL);
        let mut shutdown_rx = shutdown.subscribe();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    Self::reconcile(&self, &shutdown);
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Health probe received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn reconcile(probe: &Arc<Self>, shutdown: &Arc<Shutdown>) {
        for instance in probe.roster.snapshot().iter() {
            if instance.state() != InstanceState::Running {
                continue;
            }
            if probe.tasks.contains_key(&instance.id) {
                continue;
            }
            let task_probe = probe.clone();
            let instance = instance.clone();
            let rx = shutdown.subscribe();
            let id = instance.id;
            let handle = tokio::spawn(async move {
                task_probe.probe_loop(instance, rx).await;
            });
            probe.tasks.insert(id, handle);
        }
        probe.tasks.retain(|_, handle| !handle.is_finished());
    }

    async fn probe_loop(
        &self,
        instance: Arc<Instance>,
        mut shutdown: tokio::sync::broadcast::Receiver<()>,
    ) {
        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if instance.state() != InstanceState::Running {
                        tracing::debug!(instance = %instance.id, "Instance left Running, probe loop ending");
                        break;
                    }
                    let outcome = self.probe_once(&instance).await;
                    self.apply(&instance, outcome);
                }
                _ = shutdown.recv() => break,
            }
        }
    }

    async fn probe_once(&self, instance: &Instance) -> ProbeOutcome {
        let uri = format!("http://{}{}", instance.addr, self.config.path);
        let request = match Request::builder()
            .method("GET")
            .uri(uri)
            .header("user-agent", "fleet-control-health-probe")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!("Failed to build probe request: {}", e);
                return ProbeOutcome::ConnectError;
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let status = response.status().as_u16();
                if status == self.config.expect_status {
                    ProbeOutcome::Passed
                } else {
                    ProbeOutcome::UnexpectedStatus(status)
                }
            }
            Ok(Err(_)) => ProbeOutcome::ConnectError,
            Err(_) => ProbeOutcome::TimedOut,
        }
    }

    fn apply(&self, instance: &Arc<Instance>, outcome: ProbeOutcome) {
        let transition = if outcome.is_success() {
            instance.mark_success(self.config.healthy_threshold)
        } else {
            tracing::warn!(
                instance = %instance.id,
                addr = %instance.addr,
                outcome = outcome.as_str(),
                "Probe failed"
            );
            instance.mark_failure(self.config.unhealthy_threshold)
        };

        if let Some(state) = transition {
            tracing::info!(
                instance = %instance.id,
                addr = %instance.addr,
                state = ?state,
                "Health transition"
            );
            metrics::record_instance_health(
                &instance.addr.to_string(),
                state == HealthState::Healthy,
            );
        }
    }
}
