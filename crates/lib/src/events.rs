//! Observer registry for integration hooks.
//!
//! Embedders attach named handlers that observe adapter activity. Event
//! names are case-insensitive. Calling an event invokes its handlers in
//! attach order and ANDs their boolean results; an event nobody listens to
//! reports `true`.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

/// An attached handler's detach token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventId(u64);

type EventFn = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// A registry of named observer hooks.
#[derive(Default)]
pub struct EventRegistry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    handlers: HashMap<String, Vec<(EventId, EventFn)>>,
    next_id: u64,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a handler to an event, returning its detach token.
    ///
    /// An empty event name is rejected.
    pub fn attach(
        &self,
        event: &str,
        handler: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Option<EventId> {
        if event.is_empty() {
            return None;
        }
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.next_id += 1;
        let id = EventId(inner.next_id);
        inner
            .handlers
            .entry(event.to_lowercase())
            .or_default()
            .push((id, Box::new(handler)));
        Some(id)
    }

    /// Detaches one handler by its token. Returns whether it was attached.
    pub fn detach(&self, event: &str, id: EventId) -> bool {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let event = event.to_lowercase();
        let Some(handlers) = inner.handlers.get_mut(&event) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(attached, _)| *attached != id);
        let detached = handlers.len() != before;
        if handlers.is_empty() {
            inner.handlers.remove(&event);
        }
        detached
    }

    /// Detaches every handler from every event.
    pub fn detach_all(&self) {
        self.inner
            .write()
            .expect("registry lock poisoned")
            .handlers
            .clear();
    }

    /// Calls an event's handlers in attach order, ANDing their results.
    ///
    /// An event with no handlers reports `true`.
    pub fn call(&self, event: &str, data: &Value) -> bool {
        let inner = self.inner.read().expect("registry lock poisoned");
        let Some(handlers) = inner.handlers.get(&event.to_lowercase()) else {
            return true;
        };
        handlers.iter().all(|(_, handler)| handler(data))
    }

    /// Whether any handler is attached to the event.
    pub fn check(&self, event: &str) -> bool {
        !event.is_empty()
            && self
                .inner
                .read()
                .expect("registry lock poisoned")
                .handlers
                .contains_key(&event.to_lowercase())
    }
}
