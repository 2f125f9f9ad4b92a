//! Append-only telemetry sink.

use std::sync::Arc;
use std::sync::Mutex;

use crucible_protocol::TelemetryEvent;

/// Thread-safe, append-only record of tool dispatches.
///
/// Cloning shares the underlying buffer; exporters drain snapshots out of
/// band.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySink {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
}

impl TelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: TelemetryEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }

    /// A copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
