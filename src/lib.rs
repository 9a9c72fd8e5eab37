//! Embedded V8 engine with typed value handles and a cross-thread callback bridge.
//!
//! An [`Engine`] owns one isolate and one global context. Hosts exchange values
//! with scripts through [`JsValue`] handles, expose native functions with
//! [`Engine::new_callback`], and plug file system, timer and log providers in
//! through [`host::HostPlatform`]. Provider completions may arrive on any
//! thread, at any time: they re-enter the engine through a weak reference and
//! are discarded once the engine is gone.

#[macro_use]
mod macros;

mod callbacks;
mod context_guard;
mod engine;
mod error;
mod events;
mod gc;
mod isolate;
mod runtime;
mod v8_helpers;
mod value;
mod weak_values;

pub mod config;
pub mod host;
pub mod platform;

// Core API
pub use context_guard::ContextGuard;
pub use engine::{Engine, EngineBuilder};
pub use value::{JsValue, ToJs};
pub use weak_values::WeakValuesId;

pub use callbacks::NativeFunction;
pub use config::{AppInfo, EngineLimits, HostConfig};
pub use error::{Error, Result, ScriptError};
pub use events::EventCallback;
pub use host::{HostPlatform, HostPlatformBuilder};
pub use isolate::{DefaultIsolateProvider, IsolateProvider};
