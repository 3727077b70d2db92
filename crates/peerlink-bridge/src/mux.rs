//! Event multiplexer: typed fan-out of engine events.
//!
//! Subscribers register per [`EventKind`]. Every current subscriber of a
//! kind receives each event of that kind exactly once, in
//! engine-emission order for that kind; no ordering holds across kinds.
//! A panicking handler is isolated and logged; it never prevents
//! delivery to the remaining subscribers and never kills the dispatch
//! loop.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use peerlink_engine::{EngineEvent, EventKind};
use tracing::error;

type Handler = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// Token returned by [`EventMux::subscribe`]; pass it back to
/// [`EventMux::unsubscribe`] to stop receiving events.
#[derive(Debug, Clone)]
pub struct Subscription {
    kind: EventKind,
    id: u64,
}

impl Subscription {
    /// Event kind this subscription delivers.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

/// The multiplexer. Shared by the bridge controller and its event pump.
pub struct EventMux {
    subscribers: Mutex<HashMap<EventKind, Vec<(u64, Handler)>>>,
    next_id: AtomicU64,
}

impl EventMux {
    /// New multiplexer with no subscribers.
    pub fn new() -> Self {
        Self { subscribers: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1) }
    }

    /// Register `handler` for events of `kind`.
    ///
    /// Handlers receive a shared reference to the event and must not
    /// block; they run on the bridge's event pump.
    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&EngineEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self.lock();
        subscribers.entry(kind).or_default().push((id, Arc::new(handler)));
        Subscription { kind, id }
    }

    /// Remove a subscription. Returns whether it was still registered.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let mut subscribers = self.lock();
        let Some(handlers) = subscribers.get_mut(&subscription.kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != subscription.id);
        handlers.len() != before
    }

    /// Number of live subscriptions for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `event` to every current subscriber of its kind.
    pub fn publish(&self, event: &EngineEvent) {
        // Snapshot outside the lock so a handler that subscribes or
        // unsubscribes does not deadlock, and a slow handler does not
        // block registration.
        let handlers: Vec<(u64, Handler)> = {
            let subscribers = self.lock();
            subscribers.get(&event.kind()).map(Vec::clone).unwrap_or_default()
        };
        for (id, handler) in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                error!(subscriber = id, kind = ?event.kind(), "subscriber handler panicked");
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<EventKind, Vec<(u64, Handler)>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventMux {
    fn default() -> Self {
        Self::new()
    }
}
