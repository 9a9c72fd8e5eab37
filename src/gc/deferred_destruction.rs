//! Deferred destruction queue for V8 handles.
//!
//! Releasing a `v8::Global` touches the isolate's handle table, which is only
//! safe while the isolate is locked. A `JsValue` may be dropped from any thread
//! (a provider's completion thread, a host thread holding a result), so handles
//! released without the lock are queued here and destroyed on the next
//! acquisition of the engine's context guard.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// A `v8::Global` that may be moved between threads.
///
/// The handle is only created, dereferenced or dropped under the owning
/// engine's context guard; outside of it, it is inert data.
pub(crate) struct SendGlobal<T>(pub(crate) v8::Global<T>);

// SAFETY: see the type documentation; all handle-table access happens under
// the isolate lock.
unsafe impl<T> Send for SendGlobal<T> {}
unsafe impl<T> Sync for SendGlobal<T> {}

/// Per-engine queue of handles waiting for the isolate lock.
pub(crate) struct DeferredDestructionQueue {
    queue: Mutex<VecDeque<SendGlobal<v8::Value>>>,

    /// Fast check for pending items (avoids lock acquisition on hot path)
    pending_count: AtomicU64,
}

impl Default for DeferredDestructionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredDestructionQueue {
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(8)),
            pending_count: AtomicU64::new(0),
        }
    }

    /// Queue a handle for destruction. Callable from any thread.
    pub(crate) fn defer(&self, handle: v8::Global<v8::Value>) {
        self.queue.lock().push_back(SendGlobal(handle));
        self.pending_count.fetch_add(1, Ordering::Release);

        tracing::trace!("Deferred V8 handle destruction (pending: {})", self.len());
    }

    #[inline]
    pub(crate) fn has_pending(&self) -> bool {
        self.pending_count.load(Ordering::Acquire) > 0
    }

    #[inline]
    pub(crate) fn len(&self) -> u64 {
        self.pending_count.load(Ordering::Acquire)
    }

    /// Destroy every queued handle.
    ///
    /// Must only be called while the engine's isolate is locked.
    pub(crate) fn process_all(&self) {
        if !self.has_pending() {
            return;
        }

        let handles: VecDeque<SendGlobal<v8::Value>> = std::mem::take(&mut *self.queue.lock());

        let count = handles.len();

        if count == 0 {
            return;
        }

        drop(handles);

        self.pending_count
            .fetch_sub(count as u64, Ordering::Release);

        tracing::trace!("Processed {} deferred handle destructions", count);
    }
}

impl std::fmt::Debug for DeferredDestructionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredDestructionQueue")
            .field("pending_count", &self.len())
            .finish()
    }
}
