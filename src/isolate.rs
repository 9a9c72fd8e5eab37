//! Isolate creation and the locker-managed isolate owned by an engine.
//!
//! The engine's isolate is a `v8::UnenteredIsolate`: it is never entered
//! implicitly and can only be used through a `v8::Locker`, which lets
//! completion handlers on any thread take turns on it.

use std::cell::UnsafeCell;
use std::mem::ManuallyDrop;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::config::EngineLimits;
use crate::error::{Error, Result};

/// Supplies the isolate an engine runs on.
///
/// Hosts that need custom `CreateParams` (snapshots, allocators) implement
/// this; everyone else uses [`DefaultIsolateProvider`].
pub trait IsolateProvider: Send {
    fn create_isolate(&self, limits: &EngineLimits) -> Result<v8::UnenteredIsolate>;
}

/// Creates a fresh isolate with the configured heap limits.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultIsolateProvider;

impl IsolateProvider for DefaultIsolateProvider {
    fn create_isolate(&self, limits: &EngineLimits) -> Result<v8::UnenteredIsolate> {
        if limits.heap_max_mb == 0 || limits.heap_initial_mb > limits.heap_max_mb {
            return Err(Error::Isolate(format!(
                "invalid heap limits: initial {}MB, max {}MB",
                limits.heap_initial_mb, limits.heap_max_mb
            )));
        }

        crate::platform::get_platform();

        let params = v8::CreateParams::default()
            .heap_limits(limits.heap_initial_bytes(), limits.heap_max_bytes())
            .allow_atomics_wait(false);

        Ok(v8::Isolate::new_unentered(params))
    }
}

/// An isolate that requires explicit locking before use.
///
/// The re-entrant mutex serializes threads before a `v8::Locker` is created,
/// so at most one thread ever holds a mutable path to the isolate.
pub(crate) struct LockerManagedIsolate {
    exclusive: ReentrantMutex<()>,
    isolate: UnsafeCell<v8::UnenteredIsolate>,
}

// SAFETY: the isolate is only reached through `lock` and `lock_detached`,
// which hold `exclusive` for as long as the returned locker lives.
unsafe impl Send for LockerManagedIsolate {}
unsafe impl Sync for LockerManagedIsolate {}

impl LockerManagedIsolate {
    pub(crate) fn new(isolate: v8::UnenteredIsolate) -> Self {
        Self {
            exclusive: ReentrantMutex::new(()),
            isolate: UnsafeCell::new(isolate),
        }
    }

    /// Acquire exclusive access to the isolate and lock it for this thread.
    pub(crate) fn lock(&self) -> (ReentrantMutexGuard<'_, ()>, v8::Locker<'_>) {
        let exclusive = self.exclusive.lock();

        // SAFETY: `exclusive` is held, and overlapping guards on the same
        // thread join the existing lock frame instead of coming here.
        let isolate = unsafe { &mut *self.isolate.get() };
        let locker = v8::Locker::new(isolate);

        (exclusive, locker)
    }

    /// Like [`lock`](Self::lock), but the hold is not tied to a borrow of
    /// `self`, so it can be parked in a thread-local and released by whichever
    /// guard finishes last.
    ///
    /// # Safety
    ///
    /// `self` must outlive the returned [`IsolateLock`], and the lock must be
    /// dropped on the thread that took it.
    pub(crate) unsafe fn lock_detached(&self) -> IsolateLock {
        std::mem::forget(self.exclusive.lock());

        // SAFETY: `exclusive` is held until `IsolateLock` is dropped; the
        // caller guarantees `self` outlives it.
        let isolate = unsafe { &mut *self.isolate.get() };

        IsolateLock {
            locker: ManuallyDrop::new(v8::Locker::new(isolate)),
            exclusive: &self.exclusive,
        }
    }
}

/// A detached hold on a [`LockerManagedIsolate`], see
/// [`LockerManagedIsolate::lock_detached`].
pub(crate) struct IsolateLock {
    locker: ManuallyDrop<v8::Locker<'static>>,
    exclusive: *const ReentrantMutex<()>,
}

impl IsolateLock {
    pub(crate) fn isolate_ptr(&mut self) -> *mut v8::Isolate {
        let isolate: &mut v8::Isolate = &mut self.locker;
        isolate
    }
}

impl Drop for IsolateLock {
    fn drop(&mut self) {
        // SAFETY: the locker is dropped exactly once, before the mutex hold it
        // was created under is given back on this same thread.
        unsafe {
            ManuallyDrop::drop(&mut self.locker);
            (*self.exclusive).force_unlock();
        }
    }
}
