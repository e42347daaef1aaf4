//! Perimeter evaluation engine.
//!
//! # Responsibilities
//! - Compile configured rule sets into immutable, sorted snapshots
//! - Evaluate requests lowest-priority-number-first, first match wins
//! - Fall through to the implicit Deny when nothing matches
//! - Swap rule sets atomically on reload
//!
//! # Design Decisions
//! - Evaluation is a pure read over an `Arc` snapshot; unbounded concurrent
//!   evaluation is safe and never blocks a reload
//! - Priority uniqueness is validated eagerly at build time, not at
//!   evaluation time
//! - An unknown perimeter name evaluates to Deny (fail closed)

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::schema::PerimeterConfig;
use crate::error::PerimeterError;
use crate::observability::metrics;
use crate::perimeter::audit::{Decision, DecisionLog};
use crate::perimeter::rule::{Action, Direction, Protocol, SecurityRule};

/// A concrete connection attempt to judge.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest {
    pub direction: Direction,
    pub protocol: Protocol,
    pub port: u16,
    pub source: IpAddr,
    pub destination: IpAddr,
}

/// One compiled perimeter: rules sorted ascending by priority.
#[derive(Debug)]
pub struct Perimeter {
    name: String,
    rules: Vec<SecurityRule>,
}

impl Perimeter {
    /// Build a perimeter, sorting rules and rejecting duplicate priorities.
    pub fn new(name: impl Into<String>, mut rules: Vec<SecurityRule>) -> Result<Self, PerimeterError> {
        let name = name.into();
        rules.sort_by_key(|r| r.priority);
        for pair in rules.windows(2) {
            if pair[0].priority == pair[1].priority {
                return Err(PerimeterError::DuplicateRulePriority {
                    perimeter: name,
                    priority: pair[0].priority,
                });
            }
        }
        Ok(Self { name, rules })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[SecurityRule] {
        &self.rules
    }

    /// First-match scan. Returns the verdict and the priority of the rule
    /// that produced it; None means the implicit trailing Deny fired.
    pub fn decide(&self, req: &AccessRequest) -> (Action, Option<u32>) {
        for rule in &self.rules {
            if rule.matches(req.direction, req.protocol, req.port, req.source, req.destination) {
                return (rule.action, Some(rule.priority));
            }
        }
        (Action::Deny, None)
    }

    /// Evaluate a request against this perimeter alone.
    pub fn evaluate(&self, req: &AccessRequest) -> Action {
        self.decide(req).0
    }
}

/// All named perimeters behind one atomically swappable snapshot, plus the
/// shared audit log. Independent perimeters evaluate independently; a packet
/// must pass each perimeter along its path.
pub struct PerimeterSet {
    snapshot: ArcSwap<HashMap<String, Arc<Perimeter>>>,
    log: DecisionLog,
}

impl PerimeterSet {
    pub fn from_config(
        configs: &[PerimeterConfig],
        log_capacity: usize,
    ) -> Result<Self, PerimeterError> {
        let map = Self::build(configs)?;
        Ok(Self {
            snapshot: ArcSwap::from_pointee(map),
            log: DecisionLog::new(log_capacity),
        })
    }

    fn build(
        configs: &[PerimeterConfig],
    ) -> Result<HashMap<String, Arc<Perimeter>>, PerimeterError> {
        let mut map = HashMap::new();
        for config in configs {
            let perimeter = Perimeter::new(config.name.clone(), config.rules.clone())?;
            map.insert(config.name.clone(), Arc::new(perimeter));
        }
        Ok(map)
    }

    /// Replace every perimeter with a freshly compiled snapshot. The old
    /// snapshot stays in effect if the new one fails to build.
    pub fn reload(&self, configs: &[PerimeterConfig]) -> Result<(), PerimeterError> {
        let map = Self::build(configs)?;
        self.snapshot.store(Arc::new(map));
        tracing::info!(perimeters = configs.len(), "Perimeter rule sets swapped");
        Ok(())
    }

    /// Evaluate a request against one named perimeter, recording the
    /// decision for audit. Unknown perimeter names deny.
    pub fn evaluate(&self, perimeter: &str, req: &AccessRequest) -> Action {
        let snapshot = self.snapshot.load();
        let (action, matched_priority) = match snapshot.get(perimeter) {
            Some(p) => p.decide(req),
            None => {
                tracing::warn!(perimeter = %perimeter, "Evaluation against unknown perimeter");
                (Action::Deny, None)
            }
        };

        self.log.record(Decision {
            perimeter: perimeter.to_string(),
            direction: req.direction,
            protocol: req.protocol,
            port: req.port,
            source: req.source.to_string(),
            destination: req.destination.to_string(),
            action,
            matched_priority,
            at_epoch_ms: 0,
        });
        metrics::record_perimeter_decision(perimeter, action);

        action
    }

    pub fn names(&self) -> Vec<String> {
        self.snapshot.load().keys().cloned().collect()
    }

    pub fn recent_decisions(&self, limit: usize) -> Vec<Decision> {
        self.log.recent(limit)
    }
}
