//! Completion signalling.
//!
//! The pipeline raises exactly one [`Event::MappingLoadCompleted`] per
//! invocation through an [`EventSink`]. Sinks are fire-and-forget: they
//! must not block and cannot fail the invocation.
//!
//! # Examples
//!
//! ```rust
//! use tsunagi::events::{Event, EventSink};
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! tx.emit(Event::MappingLoadCompleted);
//!
//! assert_eq!(rx.try_recv().ok(), Some(Event::MappingLoadCompleted));
//! assert_eq!(Event::MappingLoadCompleted.as_str(), "mapping.load.completed");
//! ```

use std::fmt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

/// Notifications raised by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    MappingLoadCompleted,
}

impl Event {
    /// Wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::MappingLoadCompleted => "mapping.load.completed",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver of pipeline notifications.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

impl EventSink for UnboundedSender<Event> {
    fn emit(&self, event: Event) {
        if self.send(event).is_err() {
            debug!("Dropped {} event: receiver closed", event);
        }
    }
}

/// Sink that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: Event) {
        info!(event = event.as_str(), "Event emitted");
    }
}
