//! Event sinks.

use std::sync::Mutex;

use tracing::{debug, error, info, warn};

use crate::event::{LawEvent, Severity};

/// Receiver of law-engine events.
///
/// Sinks are shared between the ledger and the orchestrator through an
/// `Arc<dyn EventSink>`, so `emit` takes `&self`.
pub trait EventSink: Send + Sync {
    /// Deliver one event.
    fn emit(&self, event: LawEvent);
}

/// Forwards events to `tracing` at the level given by [`LawEvent::severity`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: LawEvent) {
        let kind = event.kind();
        match event.severity() {
            Severity::Debug => debug!(kind, event = ?event, "Law event"),
            Severity::Info => info!(kind, event = ?event, "Law event"),
            Severity::Warn => warn!(kind, event = ?event, "Law event"),
            Severity::Error => error!(kind, event = ?event, "Law event"),
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: LawEvent) {}
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Recorded events.
    events: Mutex<Vec<LawEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub const fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of every recorded event.
    ///
    /// Returns an empty list if the mutex is poisoned.
    pub fn events(&self) -> Vec<LawEvent> {
        let Ok(events) = self.events.lock() else {
            return Vec::new();
        };
        events.clone()
    }

    /// Number of recorded events whose `kind()` equals `kind`.
    pub fn count_kind(&self, kind: &str) -> usize {
        let Ok(events) = self.events.lock() else {
            return 0;
        };
        events.iter().filter(|e| e.kind() == kind).count()
    }

    /// Drop every recorded event.
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: LawEvent) {
        // A poisoned lock drops the event rather than panicking.
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
