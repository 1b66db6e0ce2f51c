//! Event router: hands events to caller callbacks
//!
//! A failing callback is logged and swallowed here. Transport code never
//! sees handler errors or panics.

use crate::config::{Handlers, Hook};
use crate::FeedError;
use feed_types::{Event, EventKind};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub struct EventRouter {
    handlers: Handlers,
}

impl EventRouter {
    pub fn new(handlers: Handlers) -> Self {
        Self { handlers }
    }

    pub fn has_handler(&self, kind: EventKind) -> bool {
        self.handlers.get(kind).is_some()
    }

    /// Deliver an event. `Ok(false)` means nobody listens for its kind.
    pub fn dispatch(&self, event: &Event) -> Result<bool, FeedError> {
        let kind = event.kind();
        let Some(handler) = self.handlers.get(kind) else {
            tracing::trace!("No handler for {}, dropping", kind);
            return Ok(false);
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| handler(event.payload())));
        let error = match outcome {
            Ok(Ok(())) => return Ok(true),
            Ok(Err(e)) => FeedError::handler(kind, e.to_string()),
            Err(panic) => FeedError::handler(kind, panic_message(panic)),
        };

        tracing::warn!("{}", error);
        Err(error)
    }

    pub fn notify_connected(&self) {
        fire_hook("on_connected", self.handlers.on_connected.as_ref());
    }

    pub fn notify_disconnected(&self) {
        fire_hook("on_disconnected", self.handlers.on_disconnected.as_ref());
    }
}

fn fire_hook(name: &str, hook: Option<&Hook>) {
    let Some(hook) = hook else {
        return;
    };
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| hook())) {
        tracing::warn!("{}", FeedError::handler(name, panic_message(panic)));
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".to_string()
    }
}
