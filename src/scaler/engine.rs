//! Scale decision engine.
//!
//! # Responsibilities
//! - Poll the metric source once per tick for every counted instance
//! - Evaluate threshold rules against the windowed mean
//! - Gate each direction behind its cooldown
//! - Clamp intents into the capacity bounds, drop no-ops
//!
//! # Design Decisions
//! - ScaleOut wins a simultaneous trigger: availability over cost. A
//!   correctly configured dead band never reaches this branch; the policy
//!   exists for the misconfigured case.
//! - A suppressed direction leaves the opposite direction evaluable, so a
//!   load reversal right after a scale action corrects immediately.
//! - An intent dropped at a bound does not start the cooldown; nothing was
//!   emitted, so there is nothing to suppress.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use tokio::sync::{broadcast, mpsc};

use crate::config::schema::{ScaleDirection, ScaleProfile, ScaleRule, ScalerConfig};
use crate::fleet::instance::{FleetRoster, Instance};
use crate::observability::metrics;
use crate::scaler::rules::{CooldownGate, LastAction, ScaleIntent};
use crate::telemetry::source::{MetricSample, MetricSource};
use crate::telemetry::window::MetricWindow;

/// Closed-loop decision engine: consumes windowed aggregates, emits clamped
/// scale intents onto the controller's channel.
pub struct ScaleDecisionEngine {
    rules: Vec<ScaleRule>,
    profile: ScaleProfile,
    tick_interval: Duration,
    window: MetricWindow,
    out_gate: CooldownGate,
    in_gate: CooldownGate,
    last_action: Arc<ArcSwapOption<LastAction>>,
}

impl ScaleDecisionEngine {
    pub fn new(config: &ScalerConfig, profile: ScaleProfile) -> Self {
        let retention = config
            .rules
            .iter()
            .map(|r| r.window_secs)
            .max()
            .unwrap_or(300);
        Self {
            rules: config.rules.clone(),
            profile,
            tick_interval: Duration::from_secs(config.tick_secs),
            window: MetricWindow::new(Duration::from_secs(retention)),
            out_gate: CooldownGate::new(),
            in_gate: CooldownGate::new(),
            last_action: Arc::new(ArcSwapOption::empty()),
        }
    }

    /// Shared handle for the admin API.
    pub fn last_action(&self) -> Arc<ArcSwapOption<LastAction>> {
        self.last_action.clone()
    }

    /// Feed one sample into the window.
    pub fn observe(&mut self, sample: MetricSample) {
        self.window.record(sample);
    }

    fn gate(&mut self, direction: ScaleDirection) -> &mut CooldownGate {
        match direction {
            ScaleDirection::ScaleOut => &mut self.out_gate,
            ScaleDirection::ScaleIn => &mut self.in_gate,
        }
    }

    /// One evaluation pass. `counted` is the Running+Healthy set whose
    /// samples feed the aggregate; `current` is live capacity.
    pub fn tick(
        &mut self,
        now: Instant,
        counted: &[Arc<Instance>],
        current: u32,
    ) -> Option<ScaleIntent> {
        // First triggered rule per direction, config order.
        let mut triggered_out: Option<(usize, f64)> = None;
        let mut triggered_in: Option<(usize, f64)> = None;
        for (i, rule) in self.rules.iter().enumerate() {
            let slot = match rule.direction {
                ScaleDirection::ScaleOut => &mut triggered_out,
                ScaleDirection::ScaleIn => &mut triggered_in,
            };
            if slot.is_some() {
                continue;
            }
            let Some(aggregate) =
                self.window
                    .mean(now, Duration::from_secs(rule.window_secs), counted)
            else {
                continue;
            };
            if rule.op.holds(aggregate, rule.threshold) {
                *slot = Some((i, aggregate));
            }
        }

        if triggered_out.is_some() && triggered_in.is_some() {
            tracing::warn!(
                "ScaleOut and ScaleIn triggered on the same tick; taking ScaleOut"
            );
        }

        // ScaleOut precedence, then cooldown gating.
        let (index, aggregate) = [triggered_out, triggered_in]
            .into_iter()
            .flatten()
            .find(|(i, _)| {
                let direction = self.rules[*i].direction;
                self.gate(direction).ready(now)
            })?;
        let rule = self.rules[index].clone();

        let desired = match rule.direction {
            ScaleDirection::ScaleOut => current.saturating_add(rule.step),
            ScaleDirection::ScaleIn => current.saturating_sub(rule.step),
        };
        let target = self.profile.clamp(desired);
        if target != desired {
            let err = crate::error::FleetError::BoundViolation {
                requested: desired,
                bound: target,
            };
            tracing::warn!(
                error = %err,
                min = self.profile.min,
                max = self.profile.max,
                "Scale intent clamped to capacity bounds"
            );
            metrics::record_bound_violation(rule.direction);
        }
        if target == current {
            tracing::debug!(
                direction = rule.direction.as_str(),
                capacity = current,
                "Already at bound, intent dropped"
            );
            return None;
        }

        let cooldown = Duration::from_secs(rule.cooldown_secs);
        self.gate(rule.direction).fired(now, cooldown);

        let reason = format!(
            "{} {} {} (windowed mean {:.1})",
            rule.metric,
            rule.op.as_str(),
            rule.threshold,
            aggregate
        );
        let intent = ScaleIntent::new(rule.direction, target.abs_diff(current), current, reason);

        tracing::info!(
            intent = %intent.id,
            direction = rule.direction.as_str(),
            from = current,
            to = target,
            reason = %intent.reason,
            "Scale intent emitted"
        );
        self.last_action
            .store(Some(Arc::new(LastAction::record(&intent, current, target))));
        metrics::record_scale_intent(rule.direction);

        Some(intent)
    }

    /// Drive the engine: poll the source at the tick grain, evaluate, and
    /// push intents to the controller. A full intent queue drops the intent;
    /// the next tick re-observes and re-emits if load still warrants it.
    pub async fn run(
        mut self,
        roster: Arc<FleetRoster>,
        source: Arc<dyn MetricSource>,
        metric: String,
        tx: mpsc::Sender<ScaleIntent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(
            tick_secs = self.tick_interval.as_secs(),
            rules = self.rules.len(),
            "Scale decision engine starting"
        );

        let mut ticker = tokio::time::interval(self.tick_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let snapshot = roster.snapshot();
                    // Series of departed instances go with them; a merely
                    // unhealthy instance keeps its history.
                    self.window
                        .retain(&snapshot.iter().map(|i| i.id).collect::<HashSet<_>>());
                    let counted: Vec<_> = snapshot
                        .iter()
                        .filter(|i| i.counts_toward_aggregate())
                        .cloned()
                        .collect();
                    for instance in &counted {
                        if let Some(sample) = source.sample(&metric, instance) {
                            self.observe(sample);
                        }
                    }
                    let current = roster.capacity();
                    metrics::record_fleet_size(current);
                    if let Some(intent) = self.tick(now, &counted, current) {
                        if let Err(e) = tx.try_send(intent) {
                            tracing::warn!(error = %e, "Intent queue full, dropping intent");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Scale decision engine received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
