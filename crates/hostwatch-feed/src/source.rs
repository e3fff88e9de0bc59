//! The feed source contract.
//!
//! A source is attached to a [`FeedSink`] and delivers [`FeedSignal`]s on it
//! asynchronously, in arrival order. `attach` never fails synchronously: a
//! transport that cannot be reached reports a single
//! [`ConnectionState::Error`] and stops. The returned [`FeedHandle`] owns the
//! tasks the source spawned for this attachment; [`FeedHandle::detach`]
//! aborts them and emits a final [`ConnectionState::Disconnected`].
//!
//! Tasks a source spawns for its own bookkeeping (the simulator's recovery
//! schedule) are not tracked by the handle.

use hostwatch_core::{ConnectionState, Event};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// One item delivered by a feed source.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedSignal {
    /// A new event
    Event(Event),
    /// A connection status transition
    Status(ConnectionState),
}

/// Sending side given to a source on attach.
#[derive(Debug, Clone)]
pub struct FeedSink {
    tx: mpsc::UnboundedSender<FeedSignal>,
}

impl FeedSink {
    /// Create a sink and the receiver the consumer reads from.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FeedSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver an event. Returns false once the consumer is gone.
    pub fn event(&self, event: Event) -> bool {
        self.tx.send(FeedSignal::Event(event)).is_ok()
    }

    /// Deliver a status transition. Returns false once the consumer is gone.
    pub fn status(&self, state: ConnectionState) -> bool {
        self.tx.send(FeedSignal::Status(state)).is_ok()
    }

    /// Whether the consumer has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Live attachment returned by [`EventSource::attach`].
#[derive(Debug)]
pub struct FeedHandle {
    label: String,
    sink: FeedSink,
    tasks: Vec<JoinHandle<()>>,
    detached: bool,
}

impl FeedHandle {
    /// Create a handle for an attachment labelled `label`.
    pub fn new(label: impl Into<String>, sink: FeedSink) -> Self {
        Self {
            label: label.into(),
            sink,
            tasks: Vec::new(),
            detached: false,
        }
    }

    /// Track a task whose lifetime is bound to this attachment.
    pub fn track(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    /// Label of the attached source.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether every tracked task has finished on its own.
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(JoinHandle::is_finished)
    }

    /// Stop delivery and emit the final `Disconnected` status.
    pub fn detach(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.detached {
            return;
        }
        self.detached = true;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        let _ = self.sink.status(ConnectionState::Disconnected);
        debug!(feed = %self.label, "feed detached");
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A producer of events and status transitions.
///
/// Implementations spawn onto the current tokio runtime, so `attach` must be
/// called from within one.
pub trait EventSource: Send {
    /// Human-readable label for logs.
    fn label(&self) -> String;

    /// Begin delivering signals to `sink`.
    fn attach(&mut self, sink: FeedSink) -> FeedHandle;
}

impl<S: EventSource + ?Sized> EventSource for Box<S> {
    fn label(&self) -> String {
        (**self).label()
    }

    fn attach(&mut self, sink: FeedSink) -> FeedHandle {
        (**self).attach(sink)
    }
}
