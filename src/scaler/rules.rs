//! Intent types and cooldown gating.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use uuid::Uuid;

use crate::config::schema::ScaleDirection;

/// One decision emitted by the engine, executed by the fleet controller.
///
/// The id is the idempotency token: re-delivering an intent after a crash
/// must not double-provision or double-terminate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleIntent {
    pub id: Uuid,
    pub direction: ScaleDirection,
    /// Instances to add or remove.
    pub step: u32,
    /// Capacity the engine observed when deciding. The controller
    /// re-validates against live capacity before acting.
    pub observed_capacity: u32,
    /// Human-readable trigger, e.g. "cpu > 75 (windowed mean 82.4)".
    pub reason: String,
}

impl ScaleIntent {
    pub fn new(
        direction: ScaleDirection,
        step: u32,
        observed_capacity: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            direction,
            step,
            observed_capacity,
            reason: reason.into(),
        }
    }
}

/// Record of the most recent scale action, exposed on the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct LastAction {
    pub intent: Uuid,
    pub direction: ScaleDirection,
    pub from_capacity: u32,
    pub to_capacity: u32,
    pub reason: String,
    pub at_epoch_ms: u64,
}

impl LastAction {
    pub fn record(
        intent: &ScaleIntent,
        from_capacity: u32,
        to_capacity: u32,
    ) -> Self {
        Self {
            intent: intent.id,
            direction: intent.direction,
            from_capacity,
            to_capacity,
            reason: intent.reason.clone(),
            at_epoch_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        }
    }
}

/// Per-direction cooldown gate.
///
/// A fired direction is suppressed for the triggering rule's cooldown; the
/// opposite direction keeps its own gate and stays evaluable, so a load
/// reversal can be corrected immediately.
#[derive(Debug, Default)]
pub struct CooldownGate {
    last_fired: Option<(Instant, Duration)>,
}

impl CooldownGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready(&self, now: Instant) -> bool {
        // Strictly past the cooldown: a tick landing exactly on the
        // boundary is still suppressed, so tick == cooldown cannot fire
        // every tick.
        match self.last_fired {
            Some((at, cooldown)) => now.duration_since(at) > cooldown,
            None => true,
        }
    }

    pub fn fired(&mut self, now: Instant, cooldown: Duration) {
        self.last_fired = Some((now, cooldown));
    }

    /// Time until this gate reopens; zero when ready.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_fired {
            Some((at, cooldown)) => cooldown.saturating_sub(now.duration_since(at)),
            None => Duration::ZERO,
        }
    }
}
