//! Scoped exclusive access to an engine's isolate and context.
//!
//! All V8 work happens while a [`ContextGuard`] is held. Guards for the same
//! engine that overlap on a thread (for example one taken inside a native
//! callback, or while a completion delivers several values) share one lock
//! frame on a thread-local stack. The frame owns the engine lock and the
//! `v8::Locker` and counts its guards; the isolate is unlocked once the last of
//! them is dropped, in whatever order that happens.
//!
//! Frames are released innermost first. A frame whose guards are all gone but
//! which still has another engine's frame above it stays locked until that
//! frame is released, so isolates are always exited in the order they were
//! entered.

use std::cell::{Cell, RefCell};
use std::pin::pin;
use std::sync::Arc;

use crate::engine::Engine;
use crate::isolate::IsolateLock;

thread_local! {
    /// Engines locked on this thread, innermost last.
    static FRAMES: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
    static NEXT_FRAME: Cell<u64> = const { Cell::new(0) };
}

struct Frame {
    id: u64,
    engine: *const Engine,
    isolate: *mut v8::Isolate,
    guards: usize,
    // Unlocks before `keep_alive` lets go of the engine
    lock: IsolateLock,
    // None only for the frame taken while the engine itself is being dropped
    keep_alive: Option<Arc<Engine>>,
}

/// RAII guard establishing an engine's execution context.
///
/// Not `Send`: a guard is released on the thread that acquired it.
pub struct ContextGuard<'e> {
    engine: &'e Engine,
    isolate: *mut v8::Isolate,
    frame: u64,
    outermost: bool,
}

impl<'e> ContextGuard<'e> {
    pub(crate) fn acquire(engine: &'e Engine) -> Self {
        let target = engine as *const Engine;

        let nested = FRAMES.with(|frames| match frames.borrow_mut().last_mut() {
            Some(top) if top.engine == target => {
                top.guards += 1;
                Some((top.id, top.isolate))
            }
            _ => None,
        });

        if let Some((frame, isolate)) = nested {
            return Self {
                engine,
                isolate,
                frame,
                outermost: false,
            };
        }

        // SAFETY: the frame keeps the engine (and so its isolate) alive until
        // the lock is dropped, except for the teardown frame, which is
        // released inside `Engine::drop`.
        let mut lock = unsafe { engine.isolate().lock_detached() };
        let isolate = lock.isolate_ptr();

        // Handles dropped by other threads since the last acquisition
        engine.deferred().process_all();

        let frame = NEXT_FRAME.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        });

        FRAMES.with(|frames| {
            frames.borrow_mut().push(Frame {
                id: frame,
                engine: target,
                isolate,
                guards: 1,
                lock,
                keep_alive: engine.weak().upgrade(),
            })
        });

        Self {
            engine,
            isolate,
            frame,
            outermost: true,
        }
    }

    /// Whether the current thread holds a guard for `engine`.
    pub fn is_held(engine: &Engine) -> bool {
        let target = engine as *const Engine;
        FRAMES.with(|frames| {
            frames
                .borrow()
                .iter()
                .any(|f| f.engine == target && f.guards > 0)
        })
    }

    pub fn engine(&self) -> &'e Engine {
        self.engine
    }

    /// Whether this guard took the lock (as opposed to joining a frame that
    /// was already locked on this thread).
    pub fn is_outermost(&self) -> bool {
        self.outermost
    }

    /// Run `f` inside a fresh handle scope entered into the engine's context.
    pub fn with_scope<R>(&self, f: impl FnOnce(&mut v8::PinScope<'_, '_>) -> R) -> R {
        // SAFETY: the isolate stays locked while this guard's frame exists,
        // and `self` keeps the engine alive.
        let isolate = unsafe { &mut *self.isolate };

        let scope = pin!(v8::HandleScope::new(isolate));
        let mut scope = scope.init();
        let context = v8::Local::new(&scope, self.engine.context());
        let scope = &mut v8::ContextScope::new(&mut scope, context);

        f(scope)
    }

    /// Raw isolate access for operations that need no context.
    pub(crate) fn isolate_mut(&mut self) -> &mut v8::Isolate {
        // SAFETY: as in `with_scope`; `&mut self` prevents overlapping scopes
        // created through this guard.
        unsafe { &mut *self.isolate }
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        let released = FRAMES.with(|frames| {
            let mut frames = frames.borrow_mut();

            if let Some(frame) = frames.iter_mut().find(|f| f.id == self.frame) {
                frame.guards -= 1;
            }

            let mut released = Vec::new();
            while frames.last().is_some_and(|f| f.guards == 0) {
                released.extend(frames.pop());
            }
            released
        });

        // Innermost first; outside the borrow since dropping a frame's engine
        // reference may tear that engine down.
        drop(released);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_count() -> usize {
        FRAMES.with(|frames| frames.borrow().len())
    }

    #[test]
    fn test_nested_guards_share_a_frame() {
        let engine = Engine::builder().build().unwrap();

        let outer = engine.lock();
        let inner = engine.lock();
        assert!(outer.is_outermost());
        assert!(!inner.is_outermost());
        assert_eq!(frame_count(), 1);

        drop(outer);
        assert_eq!(frame_count(), 1);
        assert!(ContextGuard::is_held(&engine));

        drop(inner);
        assert_eq!(frame_count(), 0);
        assert!(!ContextGuard::is_held(&engine));
    }

    #[test]
    fn test_frames_of_other_engines_release_innermost_first() {
        let first = Engine::builder().build().unwrap();
        let second = Engine::builder().build().unwrap();

        let a = first.lock();
        let b = second.lock();
        assert_eq!(frame_count(), 2);

        // `first` stays locked below `second` until `second` is released
        drop(a);
        assert!(!ContextGuard::is_held(&first));
        assert_eq!(frame_count(), 2);

        drop(b);
        assert_eq!(frame_count(), 0);

        assert_eq!(first.evaluate("1 + 1", None).unwrap().as_int(), 2);
        assert_eq!(second.evaluate("2 + 2", None).unwrap().as_int(), 4);
    }
}
