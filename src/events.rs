//! Named native event callbacks, triggered from script via `_triggerEvent`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::value::JsValue;

/// Native handler for a named event.
pub type EventCallback = Arc<dyn Fn(Vec<JsValue>) + Send + Sync>;

#[derive(Default)]
pub(crate) struct EventCallbacks {
    callbacks: Mutex<HashMap<String, EventCallback>>,
}

impl EventCallbacks {
    /// Register `callback` for `name`, replacing any previous one.
    pub(crate) fn set(&self, name: &str, callback: EventCallback) {
        self.callbacks.lock().insert(name.to_string(), callback);
    }

    pub(crate) fn remove(&self, name: &str) -> bool {
        self.callbacks.lock().remove(name).is_some()
    }

    pub(crate) fn get(&self, name: &str) -> Option<EventCallback> {
        self.callbacks.lock().get(name).cloned()
    }

    /// Invoke the callback registered for `name`, if any.
    ///
    /// The callback is cloned out first and runs without the map locked, so it
    /// may itself register or remove callbacks.
    pub(crate) fn trigger(&self, name: &str, params: Vec<JsValue>) -> bool {
        let Some(callback) = self.get(name) else {
            tracing::trace!("No callback registered for event '{}'", name);
            return false;
        };

        callback(params);
        true
    }

    /// Drop every registered callback, returning them so the caller controls
    /// where their captured values are released.
    pub(crate) fn take_all(&self) -> Vec<EventCallback> {
        self.callbacks
            .lock()
            .drain()
            .map(|(_, callback)| callback)
            .collect()
    }
}
