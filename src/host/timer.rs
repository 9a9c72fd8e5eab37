//! Delayed task provider backing `setTimeout`.

use std::time::Duration;

use tokio::runtime::Handle;

pub type TimerCallback = Box<dyn FnOnce() + Send>;

pub trait Timer: Send + Sync {
    /// Invoke `callback` once, on any thread, no earlier than `delay` from now.
    fn set_timer(&self, delay: Duration, callback: TimerCallback);
}

/// `tokio::time` backed timer.
pub struct DefaultTimer {
    handle: Handle,
}

impl DefaultTimer {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Timer for DefaultTimer {
    fn set_timer(&self, delay: Duration, callback: TimerCallback) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            super::file_system::complete(Box::new(move |()| callback()), ());
        });
    }
}
