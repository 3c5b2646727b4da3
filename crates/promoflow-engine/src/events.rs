//! Event sinks: fire-and-forget delivery of lifecycle events
//!
//! The orchestrator emits a [`WorkflowEvent`] at every externally visible
//! transition. Sinks must never block or fail a state transition; a sink
//! that talks to a broker should buffer internally and report delivery
//! problems through its own logging.

use parking_lot::RwLock;
use promoflow_types::WorkflowEvent;
use std::sync::Arc;
use tracing::info;

/// Receives lifecycle events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &WorkflowEvent);
}

/// Logs every event through `tracing`. The default sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &WorkflowEvent) {
        info!(event = event.name(), payload = ?event, "workflow event");
    }
}

/// Buffers events in memory for inspection. Test sink.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: RwLock<Vec<WorkflowEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events seen so far, in emission order
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.read().clone()
    }

    /// Names of all events seen so far
    pub fn names(&self) -> Vec<&'static str> {
        self.events.read().iter().map(|e| e.name()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.read().iter().filter(|e| e.name() == name).count()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: &WorkflowEvent) {
        self.events.write().push(event.clone());
    }
}

/// Delivers each event to every registered sink, in registration order
#[derive(Default)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutEventSink {
    fn emit(&self, event: &WorkflowEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
