//! Editor notifications
//!
//! The session reports what a host should tell the user through an [`EventSink`] handed to it,
//! instead of reaching into any UI itself.

use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EditorEvent {
    /// The storage text could not be split into segments; only the source surface is offered.
    ParseDegraded { reason: String },
    DiagramMismatch { id: String, reason: String },
    RenderFailed { id: String, message: String },
    RenderCompleted { id: String },
    SelectionCancelled,
    EditFailed { message: String },
    ReplacementApplied { strategy: String },
    ReplacementNotFound { text: String },
    ReplacementUndone,
    DocumentCommitted { surface: String, diagrams: usize },
}

pub trait EventSink {
    fn emit(&mut self, event: EditorEvent);
}

impl<F> EventSink for F
where
    F: FnMut(EditorEvent),
{
    fn emit(&mut self, event: EditorEvent) {
        self(event)
    }
}

impl EventSink for Vec<EditorEvent> {
    fn emit(&mut self, event: EditorEvent) {
        self.push(event);
    }
}

/// A sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: EditorEvent) {}
}

/// Shared recording sink: clone it, hand one clone to the session, read the other.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<EditorEvent>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EditorEvent> {
        self.0.borrow().clone()
    }

    pub fn take(&self) -> Vec<EditorEvent> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: EditorEvent) {
        self.0.borrow_mut().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sinks() {
        let mut seen = Vec::new();
        {
            let mut sink = |event: EditorEvent| seen.push(event);
            sink.emit(EditorEvent::SelectionCancelled);
        }
        assert_eq!(seen, vec![EditorEvent::SelectionCancelled]);

        let log = EventLog::new();
        let mut handle = log.clone();
        handle.emit(EditorEvent::ReplacementUndone);
        assert_eq!(log.take(), vec![EditorEvent::ReplacementUndone]);
        assert!(log.events().is_empty());
    }

    #[test]
    fn test_event_json_shape() {
        let event = EditorEvent::RenderFailed {
            id: "diagram-0".into(),
            message: "bad".into(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({"event": "render-failed", "id": "diagram-0", "message": "bad"})
        );
    }
}
