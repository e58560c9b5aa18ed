//! Synchronous publish/subscribe hub.
//!
//! Services talk to each other through the bus instead of holding direct
//! references. Handlers registered under a channel run in registration order
//! on the emitting task; a handler that panics is logged and skipped.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error};

use crate::domain::{BusEvent, EventName};

pub type Handler = Arc<dyn Fn(&BusEvent) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<HashMap<EventName, Vec<Handler>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<EventName, usize> = self
            .table()
            .iter()
            .map(|(name, handlers)| (*name, handlers.len()))
            .collect();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}

fn same_handler(a: &Handler, b: &Handler) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<EventName, Vec<Handler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `handler` under `name` and hands it back for a later
    /// [`off`](Self::off). Registering the same `Arc` twice is a no-op.
    pub fn on(&self, name: EventName, handler: Handler) -> Handler {
        let mut table = self.table();
        let handlers = table.entry(name).or_default();
        if handlers.iter().any(|existing| same_handler(existing, &handler)) {
            debug!(event = %name, "Handler already registered");
        } else {
            handlers.push(handler.clone());
        }
        handler
    }

    /// Wraps a closure and registers it.
    pub fn subscribe<F>(&self, name: EventName, handler: F) -> Handler
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        self.on(name, Arc::new(handler))
    }

    /// Removes one handler, or every handler of `name` when `handler` is
    /// `None`. Returns how many were removed.
    pub fn off(&self, name: EventName, handler: Option<&Handler>) -> usize {
        let mut table = self.table();
        let Some(handlers) = table.get_mut(&name) else {
            return 0;
        };
        let before = handlers.len();
        match handler {
            Some(target) => handlers.retain(|existing| !same_handler(existing, target)),
            None => handlers.clear(),
        }
        let removed = before - handlers.len();
        if handlers.is_empty() {
            table.remove(&name);
        }
        removed
    }

    pub fn handler_count(&self, name: EventName) -> usize {
        self.table().get(&name).map_or(0, Vec::len)
    }

    /// Delivers `event` to every handler of its channel.
    ///
    /// The handler list is copied before delivery, so handlers may register,
    /// remove or emit without deadlocking.
    pub fn emit(&self, event: BusEvent) {
        let name = event.name();
        let handlers = match self.table().get(&name) {
            Some(handlers) => handlers.clone(),
            None => return,
        };

        debug!(event = %name, handlers = handlers.len(), "Emitting event");
        for (index, handler) in handlers.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&event)));
            if let Err(payload) = outcome {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(event = %name, handler = index, reason = %reason, "Event handler panicked");
            }
        }
    }
}
