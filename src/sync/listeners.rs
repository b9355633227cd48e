//! Listener registry
//!
//! Maps class-qualified event types to the handlers registered for them.
//! Registration happens during client setup, notification from many room
//! units at once, so the map sits behind a read-mostly lock.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, trace};

use roomsync_core::{Event, EventHandler, EventSource, EventType};

/// Ordered handler lists keyed by event type
#[derive(Default)]
pub struct ListenerRegistry {
    handlers: RwLock<HashMap<EventType, Vec<Arc<dyn EventHandler>>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `event_type`.
    ///
    /// Registering the same handler twice means it runs twice.
    pub fn register<H>(&self, event_type: EventType, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.register_shared(event_type, Arc::new(handler));
    }

    /// Append an already shared handler, e.g. one registered for several types
    pub fn register_shared(&self, event_type: EventType, handler: Arc<dyn EventHandler>) {
        debug!("🔧 Registering listener for {}", event_type.repr());
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event_type)
            .or_default()
            .push(handler);
    }

    /// Invoke every handler registered for the event's type, in registration
    /// order, on the calling task. Returns how many handlers ran.
    pub fn notify(&self, source: EventSource, event: &Event) -> usize {
        // Snapshot so handlers may register further listeners without deadlocking
        let handlers = match self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event.event_type)
        {
            Some(handlers) => handlers.clone(),
            None => return 0,
        };

        trace!(
            "📣 Notifying {} listener(s) of {} from {}",
            handlers.len(),
            event.event_type.repr(),
            source
        );
        for handler in &handlers {
            handler.handle(source, event);
        }
        handlers.len()
    }

    /// Number of handlers registered for one type
    pub fn handler_count(&self, event_type: &EventType) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}
