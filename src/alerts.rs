//! Operator alert log.
//!
//! A bounded, newest-first record of salient events: connection transitions
//! from the telemetry link and threat labels raised by the backend. Entries
//! are never mutated; eviction at capacity is the only removal.

use std::collections::VecDeque;

use crate::now_millis;

/// Maximum retained entries; inserting beyond this evicts the oldest.
pub const ALERT_LOG_CAPACITY: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug)]
pub struct AlertEntry {
    /// Timestamp-derived id (epoch milliseconds at insertion).
    pub id: u64,
    pub message: String,
    pub severity: Severity,
}

/// Bounded alert record, newest first.
#[derive(Debug, Default)]
pub struct AlertLog {
    entries: VecDeque<AlertEntry>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(ALERT_LOG_CAPACITY),
        }
    }

    /// Prepend an entry, evicting the oldest once at capacity.
    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        self.entries.push_front(AlertEntry {
            id: now_millis(),
            message: message.into(),
            severity,
        });
        self.entries.truncate(ALERT_LOG_CAPACITY);
    }

    /// Record the threat labels raised by one telemetry tick.
    ///
    /// Deduplication is a single-entry lookback: a threat is skipped only
    /// when the newest entry already references it. The same threat
    /// re-raised after one intervening unrelated entry logs again; that
    /// density is intentional and must not be widened to a full-log scan.
    pub fn record_threats(&mut self, threats: &[String]) {
        for threat in threats {
            let text = humanize_threat(threat);
            if self
                .entries
                .front()
                .is_some_and(|entry| entry.message.contains(&text))
            {
                continue;
            }
            self.push(Severity::Error, format!("CRITICAL: {}", text));
        }
    }

    pub fn newest(&self) -> Option<&AlertEntry> {
        self.entries.front()
    }

    /// Entries newest first.
    pub fn iter(&self) -> impl Iterator<Item = &AlertEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Human-readable variant of a threat identifier.
fn humanize_threat(label: &str) -> String {
    label.replace('_', " ")
}
