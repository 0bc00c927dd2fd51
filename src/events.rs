//! Typed circuit events and their dispatcher
//!
//! Every permission denial, recorded outcome, transition, and reset is
//! announced to subscribers as a [`CircuitEvent`]. Dispatch is synchronous:
//! handlers run inline on the thread that triggered the event, after the
//! breaker has finished mutating its own state for that action.

use crate::state::CircuitState;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Event type for subscription, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Success,
    Error,
    IgnoredError,
    NotPermitted,
    StateTransition,
    Reset,
}

const KIND_COUNT: usize = 6;

/// Payload of one circuit event.
#[derive(Clone, Copy)]
pub enum EventDetail<'a> {
    /// A call completed and counted as a success.
    Success { elapsed: Duration },
    /// A call failed and counted as a failure.
    Error { elapsed: Duration, error: &'a dyn Any },
    /// A call failed with an error type the breaker is configured to drop.
    IgnoredError { elapsed: Duration, error: &'a dyn Any },
    /// A permission request was denied.
    NotPermitted,
    /// The breaker moved between states. Forced transitions may report
    /// `from == to`.
    StateTransition {
        from: CircuitState,
        to: CircuitState,
    },
    /// The breaker was reset to closed with fresh metrics.
    Reset,
}

impl EventDetail<'_> {
    /// The subscription key this payload is dispatched under.
    pub fn kind(&self) -> EventKind {
        match self {
            EventDetail::Success { .. } => EventKind::Success,
            EventDetail::Error { .. } => EventKind::Error,
            EventDetail::IgnoredError { .. } => EventKind::IgnoredError,
            EventDetail::NotPermitted => EventKind::NotPermitted,
            EventDetail::StateTransition { .. } => EventKind::StateTransition,
            EventDetail::Reset => EventKind::Reset,
        }
    }
}

impl fmt::Debug for EventDetail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventDetail::Success { elapsed } => f
                .debug_struct("Success")
                .field("elapsed", elapsed)
                .finish(),
            EventDetail::Error { elapsed, .. } => f
                .debug_struct("Error")
                .field("elapsed", elapsed)
                .field("error", &"<dyn Any>")
                .finish(),
            EventDetail::IgnoredError { elapsed, .. } => f
                .debug_struct("IgnoredError")
                .field("elapsed", elapsed)
                .field("error", &"<dyn Any>")
                .finish(),
            EventDetail::NotPermitted => f.write_str("NotPermitted"),
            EventDetail::StateTransition { from, to } => f
                .debug_struct("StateTransition")
                .field("from", from)
                .field("to", to)
                .finish(),
            EventDetail::Reset => f.write_str("Reset"),
        }
    }
}

/// One event, passed by reference to every subscribed handler.
#[derive(Debug, Clone, Copy)]
pub struct CircuitEvent<'a> {
    /// Name of the breaker that produced the event.
    pub circuit: &'a str,
    /// Wall-clock time the event was created.
    pub created_at: SystemTime,
    pub detail: EventDetail<'a>,
}

pub(crate) type Handler = Arc<dyn Fn(&CircuitEvent<'_>) + Send + Sync>;

/// Subscriber registry with per-kind handler lists.
///
/// Handlers run synchronously, in registration order, on a snapshot taken
/// when the event fires; a handler may therefore subscribe or call back
/// into the breaker without deadlocking, and a subscription added during
/// dispatch first sees the next event. Handler panics are not caught and
/// unwind into the caller of the operation that fired the event. Events
/// from concurrent callers may interleave arbitrarily.
pub(crate) struct EventDispatcher {
    handlers: RwLock<[Vec<Handler>; KIND_COUNT]>,
}

impl EventDispatcher {
    pub(crate) fn new() -> Self {
        Self {
            handlers: RwLock::new(Default::default()),
        }
    }

    pub(crate) fn subscribe(&self, kind: EventKind, handler: Handler) {
        self.handlers.write()[kind as usize].push(handler);
    }

    pub(crate) fn dispatch(&self, event: &CircuitEvent<'_>) {
        let snapshot = self.handlers.read()[event.detail.kind() as usize].clone();
        for handler in &snapshot {
            handler(event);
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        let counts: Vec<usize> = handlers.iter().map(Vec::len).collect();
        f.debug_struct("EventDispatcher")
            .field("handlers", &counts)
            .finish()
    }
}
