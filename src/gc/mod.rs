//! Handle lifetime management across threads.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ContextGuard (RAII)                                        │
//! │  ├── v8::Locker (thread safety, isolate enter)              │
//! │  ├── Pushed on a thread-local stack for nested acquisition  │
//! │  └── Processes deferred handle destructions                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  DeferredDestructionQueue                                   │
//! │  ├── Thread-safe queue for V8 Global handles                │
//! │  ├── Handles queued when dropped without the guard          │
//! │  └── Processed on next guard acquisition                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod deferred_destruction;

pub(crate) use deferred_destruction::{DeferredDestructionQueue, SendGlobal};
