//! Preview events and the event bus.

use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::context::DispatchContext;
use crate::field::FieldId;

/// Events emitted while a preview session is running.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewEvent {
    /// A field received a new dirty value.
    FieldEdited { field: FieldId, route: String },
    /// A dirty value was committed.
    FieldCommitted { field: FieldId },
    /// A dirty value was discarded.
    FieldDiscarded { field: FieldId },
    /// A sync request was issued for a route.
    SyncStarted { route: String },
    /// A route was re-requested; the preview should re-render it.
    ResourceRefreshed {
        route: String,
        context: DispatchContext,
        body: Value,
    },
    /// A response arrived after a newer request for the route started.
    StaleResponseDiscarded { route: String },
    /// A sync request failed. The session keeps running.
    SyncFailed { route: String, message: String },
    /// The preview session is no longer valid; sync is halted.
    SessionExpired,
    /// The session was re-authenticated and sync resumed.
    SessionResumed,
}

/// Observer of preview events.
pub trait EventListener: Send + Sync {
    /// Called for every emitted event, in bus order.
    fn on_event(&self, event: &PreviewEvent);
}

impl<F> EventListener for F
where
    F: Fn(&PreviewEvent) + Send + Sync,
{
    fn on_event(&self, event: &PreviewEvent) {
        self(event)
    }
}

struct Subscription {
    priority: i32,
    seq: u64,
    listener: Arc<dyn EventListener>,
}

#[derive(Default)]
struct BusInner {
    subscriptions: Vec<Subscription>,
    next_seq: u64,
}

/// Typed event bus with a defined firing order.
///
/// Listeners fire in ascending priority; listeners with equal priority fire
/// in subscription order. Cloning the bus shares the subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<RwLock<BusInner>>,
}

impl EventBus {
    /// Default listener priority.
    pub const DEFAULT_PRIORITY: i32 = 10;

    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a listener at the default priority.
    pub fn subscribe(&self, listener: impl EventListener + 'static) {
        self.subscribe_with_priority(Self::DEFAULT_PRIORITY, listener);
    }

    /// Subscribe a listener at a given priority.
    pub fn subscribe_with_priority(&self, priority: i32, listener: impl EventListener + 'static) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let pos = inner
            .subscriptions
            .partition_point(|s| (s.priority, s.seq) <= (priority, seq));
        inner.subscriptions.insert(
            pos,
            Subscription {
                priority,
                seq,
                listener: Arc::new(listener),
            },
        );
    }

    /// Emit an event to every listener.
    pub fn emit(&self, event: PreviewEvent) {
        // Snapshot so listeners may subscribe while being notified
        let listeners: Vec<Arc<dyn EventListener>> = {
            let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
            inner
                .subscriptions
                .iter()
                .map(|s| Arc::clone(&s.listener))
                .collect()
        };
        for listener in listeners {
            listener.on_event(&event);
        }
    }

    /// Number of subscribed listeners.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .subscriptions
            .len()
    }

    /// Check if no listener is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.len())
            .finish()
    }
}
