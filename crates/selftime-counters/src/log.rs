//! Start/end event logging for measured operations

use std::sync::Arc;

use parking_lot::Mutex;

/// Identifier of an execution context
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u64);

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Status carried by a logged event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogEventStatus {
    Start,
    End,
    Stamp,
}

/// Host sink for start/end notifications
///
/// Fire-and-forget: implementations must not call back into the scope that
/// emitted the event.
pub trait EventLogger {
    fn on_event(&self, context: ContextId, name: &str, status: LogEventStatus);
}

/// Forwards events to `tracing` at trace level
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventLogger;

impl EventLogger for TracingEventLogger {
    fn on_event(&self, context: ContextId, name: &str, status: LogEventStatus) {
        tracing::trace!(target: "selftime::events", %context, histogram = name, ?status);
    }
}

/// A recorded event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggedEvent {
    pub context: ContextId,
    pub name: String,
    pub status: LogEventStatus,
}

/// Keeps every event in memory
///
/// Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct RecordingEventLogger {
    events: Arc<Mutex<Vec<LoggedEvent>>>,
}

impl RecordingEventLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events in emission order
    pub fn events(&self) -> Vec<LoggedEvent> {
        self.events.lock().clone()
    }

    /// Number of recorded events with a given status
    pub fn count(&self, status: LogEventStatus) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.status == status)
            .count()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventLogger for RecordingEventLogger {
    fn on_event(&self, context: ContextId, name: &str, status: LogEventStatus) {
        self.events.lock().push(LoggedEvent {
            context,
            name: name.to_owned(),
            status,
        });
    }
}
