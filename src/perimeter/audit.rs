//! Perimeter decision log.
//!
//! Bounded in-memory record of evaluated requests for audit. Every
//! evaluation lands here regardless of verdict; the admin API serves the
//! most recent entries.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::perimeter::rule::{Action, Direction, Protocol};

/// One evaluated request and its verdict.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub perimeter: String,
    pub direction: Direction,
    pub protocol: Protocol,
    pub port: u16,
    pub source: String,
    pub destination: String,
    pub action: Action,
    /// Priority of the matching rule; None when the implicit Deny fired.
    pub matched_priority: Option<u32>,
    pub at_epoch_ms: u64,
}

/// Bounded ring of recent decisions.
pub struct DecisionLog {
    capacity: usize,
    entries: Mutex<VecDeque<Decision>>,
}

impl DecisionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, mut decision: Decision) {
        decision.at_epoch_ms = epoch_ms();
        let mut entries = self.entries.lock().expect("decision log mutex poisoned");
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(decision);
    }

    /// Most recent decisions, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Decision> {
        let entries = self.entries.lock().expect("decision log mutex poisoned");
        entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("decision log mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
