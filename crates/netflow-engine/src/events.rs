//! Event types for editor session notifications
//!
//! Events are sent from an [`crate::session::EditorSession`] to the UI (or
//! any consumer) to report graph changes and validation/compile results.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Trait for sending session events
///
/// This abstracts over the transport mechanism (UI channel, mpsc, log,
/// etc.) so the session can be used in different contexts.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be sent (e.g., channel closed)
    fn send(&self, event: SessionEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

/// Events emitted by an editor session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// The current graph changed (edit, undo or redo)
    #[serde(rename_all = "camelCase")]
    GraphChanged {
        can_undo: bool,
        can_redo: bool,
        node_count: usize,
        edge_count: usize,
    },

    /// Validation ran on the current graph
    #[serde(rename_all = "camelCase")]
    Validated {
        error_count: usize,
        warning_count: usize,
        info_count: usize,
    },

    /// Compilation produced a script
    #[serde(rename_all = "camelCase")]
    Compiled {
        step_count: usize,
        unresolved_count: usize,
    },

    /// Compilation was refused or failed
    #[serde(rename_all = "camelCase")]
    CompileFailed { error: String },
}

/// A no-op event sink that discards all events
///
/// Useful for headless use when events aren't needed.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: SessionEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
#[derive(Default)]
pub struct VecEventSink {
    events: Mutex<Vec<SessionEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: SessionEvent) -> Result<(), EventError> {
        self.events.lock().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();

        sink.send(SessionEvent::Compiled {
            step_count: 4,
            unresolved_count: 1,
        })
        .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);

        match &events[0] {
            SessionEvent::Compiled { step_count, .. } => assert_eq!(*step_count, 4),
            _ => panic!("Expected Compiled event"),
        }

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_null_event_sink() {
        let sink = NullEventSink;
        // Should not panic
        sink.send(SessionEvent::CompileFailed {
            error: "nope".to_string(),
        })
        .unwrap();
    }

    #[test]
    fn test_event_serialization() {
        let event = SessionEvent::GraphChanged {
            can_undo: true,
            can_redo: false,
            node_count: 2,
            edge_count: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "graphChanged");
        assert_eq!(json["canUndo"], true);
        assert_eq!(json["nodeCount"], 2);
    }
}
