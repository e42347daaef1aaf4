//! Fleet controller.
//!
//! # Responsibilities
//! - Execute scale intents one at a time, serialized per fleet
//! - Provision new instances and gate them on bootstrap readiness
//! - Select scale-in victims, drain them, then terminate
//! - Keep intent execution idempotent across redelivery
//!
//! # Design Decisions
//! - A tokio Mutex is the "fleet mutation in progress" lease; ScaleOut and
//!   ScaleIn for the same fleet never interleave
//! - Intents are re-validated against live capacity when dequeued; a
//!   queued intent that became a no-op is dropped
//! - A bootstrap timeout terminates the instance and leaves the shortfall
//!   to a later tick rather than hot-looping a broken image
//! - Victims are most-recently-added first, preferring stable, warmed
//!   capacity

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time;
use uuid::Uuid;

use crate::config::schema::{FleetSettings, RetryConfig, ScaleDirection, ScaleProfile};
use crate::error::FleetError;
use crate::fleet::instance::{FleetRoster, Instance, InstanceState};
use crate::fleet::provisioner::{ProvisionedInstance, Provisioner};
use crate::observability::metrics;
use crate::pool::BackendPool;
use crate::resilience::backoff::calculate_backoff;
use crate::scaler::rules::ScaleIntent;

/// Outcome of an already-applied intent, kept for idempotency.
#[derive(Debug, Clone, Copy)]
struct CompletedIntent {
    direction: ScaleDirection,
    applied: u32,
}

/// Executes scale intents against the roster, the pool, and the
/// provisioning collaborator.
pub struct FleetController<P: Provisioner> {
    roster: Arc<FleetRoster>,
    pool: Arc<BackendPool>,
    provisioner: Arc<P>,
    profile: ScaleProfile,
    bootstrap_timeout: Duration,
    drain_timeout: Duration,
    retry: RetryConfig,
    /// Log of completed intents; redelivery of a logged id is a no-op.
    completed: DashMap<Uuid, CompletedIntent>,
    /// Fleet mutation lease.
    mutation: Mutex<()>,
}

impl<P: Provisioner> FleetController<P> {
    pub fn new(
        roster: Arc<FleetRoster>,
        pool: Arc<BackendPool>,
        provisioner: Arc<P>,
        settings: &FleetSettings,
        retry: RetryConfig,
    ) -> Self {
        Self {
            roster,
            pool,
            provisioner,
            profile: settings.profile(),
            bootstrap_timeout: Duration::from_secs(settings.bootstrap_timeout_secs),
            drain_timeout: Duration::from_secs(settings.drain_timeout_secs),
            retry,
            completed: DashMap::new(),
            mutation: Mutex::new(()),
        }
    }

    pub fn fleet_size(&self) -> u32 {
        self.roster.capacity()
    }

    /// Bring an empty fleet up to its default capacity.
    pub async fn establish_default(&self) -> u32 {
        let intent = ScaleIntent::new(
            ScaleDirection::ScaleOut,
            self.profile.default_size,
            0,
            "establish default capacity",
        );
        self.execute(intent).await
    }

    /// Apply one intent. Returns the number of instances actually added or
    /// removed.
    pub async fn execute(&self, intent: ScaleIntent) -> u32 {
        if let Some(done) = self.completed.get(&intent.id) {
            tracing::info!(
                intent = %intent.id,
                direction = done.direction.as_str(),
                applied = done.applied,
                "Intent already completed, skipping"
            );
            return 0;
        }

        let _lease = self.mutation.lock().await;

        // Capacity may have moved while this intent sat in the queue.
        let current = self.roster.capacity();
        let desired = match intent.direction {
            ScaleDirection::ScaleOut => current.saturating_add(intent.step),
            ScaleDirection::ScaleIn => current.saturating_sub(intent.step),
        };
        let target = self.profile.clamp(desired);

        if target == current {
            tracing::info!(
                intent = %intent.id,
                direction = intent.direction.as_str(),
                observed = intent.observed_capacity,
                capacity = current,
                "Intent became a no-op after re-validation, dropped"
            );
            self.completed.insert(
                intent.id,
                CompletedIntent {
                    direction: intent.direction,
                    applied: 0,
                },
            );
            return 0;
        }

        tracing::info!(
            intent = %intent.id,
            direction = intent.direction.as_str(),
            from = current,
            to = target,
            reason = %intent.reason,
            "Executing scale intent"
        );

        let applied = if target > current {
            self.scale_out(target - current).await
        } else {
            self.scale_in(current - target).await
        };

        self.completed.insert(
            intent.id,
            CompletedIntent {
                direction: intent.direction,
                applied,
            },
        );
        metrics::record_fleet_size(self.roster.capacity());
        applied
    }

    /// Provision and bootstrap `count` instances. Returns how many reached
    /// Running.
    async fn scale_out(&self, count: u32) -> u32 {
        let mut added = 0;
        for _ in 0..count {
            let handle = match self.provision_with_retry().await {
                Ok(handle) => handle,
                Err(e) => {
                    tracing::error!(error = %e, "Provisioning degraded, abandoning remainder of intent");
                    metrics::record_fleet_degraded();
                    break;
                }
            };

            let instance = Arc::new(Instance::new(handle.addr, self.roster.alloc_seq()));
            self.roster.add(instance.clone());
            tracing::info!(
                instance = %instance.id,
                addr = %instance.addr,
                "Instance provisioning, awaiting bootstrap"
            );

            match time::timeout(self.bootstrap_timeout, self.provisioner.await_ready(handle)).await
            {
                Ok(Ok(())) => {
                    instance.set_state(InstanceState::Running);
                    self.pool.register(instance.clone());
                    tracing::info!(
                        instance = %instance.id,
                        addr = %instance.addr,
                        "Instance running"
                    );
                    added += 1;
                }
                _ => {
                    let err = FleetError::BootstrapTimeout {
                        id: instance.id,
                        timeout: self.bootstrap_timeout,
                    };
                    tracing::warn!(
                        error = %err,
                        "Terminating instance; shortfall left for a later tick"
                    );
                    metrics::record_bootstrap_timeout();
                    instance.set_state(InstanceState::Terminated);
                    self.roster.remove(instance.id);
                    if let Err(e) = self.provisioner.terminate(handle).await {
                        tracing::error!(error = %e, "Terminate after failed bootstrap also failed");
                    }
                }
            }
        }
        added
    }

    async fn provision_with_retry(&self) -> Result<ProvisionedInstance, FleetError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.provisioner.provision().await {
                Ok(handle) => return Ok(handle),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let delay =
                        calculate_backoff(attempt, self.retry.base_delay_ms, self.retry.max_delay_ms);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient provisioning error, backing off"
                    );
                    time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(FleetError::ProvisioningExhausted {
                        attempts: attempt,
                        last_error: e.to_string(),
                    })
                }
            }
        }
    }

    /// Drain and terminate `count` victims, most recently added first.
    async fn scale_in(&self, count: u32) -> u32 {
        let mut victims = self.roster.running();
        victims.sort_by_key(|i| Reverse(i.seq));
        victims.truncate(count as usize);

        let removed = victims.len() as u32;
        for instance in victims {
            self.drain_and_terminate(instance).await;
        }
        removed
    }

    /// Deregister immediately (no new traffic), wait for in-flight work to
    /// finish up to the drain timeout, then terminate.
    async fn drain_and_terminate(&self, instance: Arc<Instance>) {
        instance.set_state(InstanceState::Draining);
        self.pool.deregister(instance.id);
        tracing::info!(
            instance = %instance.id,
            addr = %instance.addr,
            in_flight = instance.in_flight(),
            "Instance draining"
        );

        let deadline = Instant::now() + self.drain_timeout;
        let forced = loop {
            if instance.in_flight() == 0 {
                break false;
            }
            if Instant::now() >= deadline {
                break true;
            }
            time::sleep(Duration::from_millis(50)).await;
        };

        if forced {
            let err = FleetError::DrainTimeout {
                id: instance.id,
                timeout: self.drain_timeout,
            };
            tracing::warn!(error = %err, in_flight = instance.in_flight(), "Forced drain");
            metrics::record_forced_drain();
        }

        if let Err(e) = self
            .provisioner
            .terminate(ProvisionedInstance {
                addr: instance.addr,
            })
            .await
        {
            tracing::error!(instance = %instance.id, error = %e, "Terminate failed");
        }
        instance.set_state(InstanceState::Terminated);
        self.roster.remove(instance.id);
        tracing::info!(instance = %instance.id, forced, "Instance terminated");
    }

    /// Consume intents until the channel closes or shutdown fires.
    pub async fn run(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<ScaleIntent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!("Fleet controller starting");
        loop {
            tokio::select! {
                maybe_intent = rx.recv() => {
                    match maybe_intent {
                        Some(intent) => {
                            self.execute(intent).await;
                        }
                        None => break,
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Fleet controller received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
