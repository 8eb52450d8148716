//! Process-wide publish/subscribe bus.
//!
//! Events are an enumerated kind (no string-keyed dispatch); listeners are
//! invoked synchronously, in registration order, with no error isolation —
//! a panicking listener unwinds into the publisher. Dispatch releases the
//! table lock before invoking listeners, so a listener that re-enters the
//! publishing path recurses instead of deadlocking; avoiding unbounded
//! recursion is the caller's responsibility.

use std::sync::{Arc, LazyLock, Mutex};

/// Named event channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The active tensor backend's identity or precision changed.
    TensorlibChanged,
}

/// Handle returned by [`subscribe`]; pass to [`unsubscribe`] to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    id: u64,
}

struct Listener {
    id: u64,
    kind: EventKind,
    callback: Arc<dyn Fn() + Send + Sync>,
}

struct EventTable {
    next_id: u64,
    listeners: Vec<Listener>,
}

static TABLE: LazyLock<Mutex<EventTable>> =
    LazyLock::new(|| Mutex::new(EventTable { next_id: 0, listeners: Vec::new() }));

/// Register a listener for an event kind. Listeners fire in registration
/// order; multiple listeners per kind are supported.
pub fn subscribe(kind: EventKind, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
    let mut table = TABLE.lock().expect("event table poisoned");
    let id = table.next_id;
    table.next_id += 1;
    table.listeners.push(Listener { id, kind, callback: Arc::new(callback) });
    Subscription { id }
}

/// Deregister a listener. Returns false if the handle was already removed.
pub fn unsubscribe(subscription: Subscription) -> bool {
    let mut table = TABLE.lock().expect("event table poisoned");
    let before = table.listeners.len();
    table.listeners.retain(|l| l.id != subscription.id);
    table.listeners.len() != before
}

/// Publish an event synchronously to every listener of its kind.
pub fn trigger(kind: EventKind) {
    let callbacks: Vec<Arc<dyn Fn() + Send + Sync>> = {
        let table = TABLE.lock().expect("event table poisoned");
        table
            .listeners
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| Arc::clone(&l.callback))
            .collect()
    };
    for callback in callbacks {
        callback();
    }
}
