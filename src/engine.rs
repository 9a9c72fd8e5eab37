//! The engine: one isolate, one global context, and everything hanging off it.

use std::io::Write;
use std::mem::ManuallyDrop;
use std::path::Path;
use std::pin::pin;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::callbacks::{self, NativeFunction};
use crate::config::{AppInfo, EngineLimits};
use crate::context_guard::ContextGuard;
use crate::error::{Error, Result};
use crate::events::{EventCallback, EventCallbacks};
use crate::gc::{DeferredDestructionQueue, SendGlobal};
use crate::host::{FileSystem, HostPlatform, LogSystem, Timer};
use crate::isolate::{DefaultIsolateProvider, IsolateProvider, LockerManagedIsolate};
use crate::value::{JsValue, ToJs};
use crate::weak_values::{WeakValueRegistry, WeakValuesId};

/// An embedded script engine.
///
/// Always handled through `Arc<Engine>`. Background work (timers, file I/O
/// completions, native callbacks) only ever holds a `Weak<Engine>`, so
/// dropping the host's last reference tears the engine down; completions that
/// arrive afterwards are discarded.
pub struct Engine {
    self_ref: Weak<Engine>,
    app_info: AppInfo,
    host: Arc<HostPlatform>,
    events: EventCallbacks,
    weak_values: WeakValueRegistry,
    deferred: DeferredDestructionQueue,
    callback_ids: Mutex<Vec<u64>>,
    // Released in `Drop`, under the guard
    context: ManuallyDrop<SendGlobal<v8::Context>>,
    // Must be the last field: dropped after every handle
    isolate: LockerManagedIsolate,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Engine with the default isolate provider and limits.
    pub fn new(app_info: AppInfo, host: Arc<HostPlatform>) -> Result<Arc<Engine>> {
        Self::builder().app_info(app_info).host(host).build()
    }

    /// Acquire the engine's execution context for the current thread.
    pub fn lock(&self) -> ContextGuard<'_> {
        ContextGuard::acquire(self)
    }

    pub(crate) fn isolate(&self) -> &LockerManagedIsolate {
        &self.isolate
    }

    pub(crate) fn deferred(&self) -> &DeferredDestructionQueue {
        &self.deferred
    }

    pub(crate) fn context(&self) -> &v8::Global<v8::Context> {
        &self.context.0
    }

    pub(crate) fn weak(&self) -> Weak<Engine> {
        self.self_ref.clone()
    }

    pub fn app_info(&self) -> &AppInfo {
        &self.app_info
    }

    pub fn host(&self) -> &Arc<HostPlatform> {
        &self.host
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        self.host.file_system()
    }

    pub fn timer(&self) -> &Arc<dyn Timer> {
        self.host.timer()
    }

    pub fn log_system(&self) -> &Arc<dyn LogSystem> {
        self.host.log_system()
    }

    // Evaluation

    /// Compile and run `source`. `filename` labels locations in stack traces.
    pub fn evaluate(self: &Arc<Self>, source: &str, filename: Option<&str>) -> Result<JsValue> {
        let guard = self.lock();

        guard.with_scope(|scope| {
            let code = v8_str!(scope, source)?;

            let origin = match filename {
                Some(filename) => {
                    let name = v8_str!(scope, filename)?;
                    Some(v8::ScriptOrigin::new(
                        scope,
                        name.into(),
                        0,
                        0,
                        false,
                        0,
                        None,
                        false,
                        false,
                        false,
                        None,
                    ))
                }
                None => None,
            };

            let tc = pin!(v8::TryCatch::new(scope));
            let tc = tc.init();

            let Some(script) = v8::Script::compile(&tc, code, origin.as_ref()) else {
                return Err(capture_exception!(tc).into());
            };

            match script.run(&tc) {
                Some(result) => Ok(JsValue::from_local(self, &tc, result)),
                None => Err(capture_exception!(tc).into()),
            }
        })
    }

    // Value construction

    pub fn new_value(self: &Arc<Self>, value: impl ToJs) -> Result<JsValue> {
        let guard = self.lock();

        guard.with_scope(|scope| {
            let local = value.to_js(self, scope)?;
            Ok(JsValue::from_local(self, scope, local))
        })
    }

    pub fn new_object(self: &Arc<Self>) -> JsValue {
        let guard = self.lock();

        guard.with_scope(|scope| {
            let object = v8::Object::new(scope);
            JsValue::from_local(self, scope, object.into())
        })
    }

    pub fn new_array(self: &Arc<Self>, values: &[JsValue]) -> Result<JsValue> {
        let guard = self.lock();

        guard.with_scope(|scope| {
            let array = v8::Array::new(scope, crate::v8_helpers::array_length(values.len())?);

            for (i, value) in values.iter().enumerate() {
                let value = value.to_js(self, scope)?;
                array.set_index(scope, i as u32, value);
            }

            Ok(JsValue::from_local(self, scope, array.into()))
        })
    }

    /// Expose a native function to script.
    ///
    /// The function receives the engine and the call's arguments. Calling it
    /// after the engine is gone throws a generic script error.
    pub fn new_callback<F>(self: &Arc<Self>, function: F) -> Result<JsValue>
    where
        F: Fn(&Arc<Engine>, Vec<JsValue>) -> Result<Option<JsValue>> + Send + Sync + 'static,
    {
        let function: NativeFunction = Arc::new(function);
        let id = callbacks::register(self, function);

        self.callback_ids.lock().push(id);

        let guard = self.lock();

        guard.with_scope(|scope| {
            let function = callbacks::create_function(scope, id)?;
            Ok(JsValue::from_local(self, scope, function.into()))
        })
    }

    pub fn global_object(self: &Arc<Self>) -> JsValue {
        let guard = self.lock();

        guard.with_scope(|scope| {
            let global = scope.get_current_context().global(scope);
            JsValue::from_local(self, scope, global.into())
        })
    }

    pub fn set_global_property(self: &Arc<Self>, name: &str, value: impl ToJs) -> Result<()> {
        self.global_object().set_property(name, value)
    }

    // Events

    /// Register the handler for `name`, replacing any existing one.
    pub fn set_event_callback<F>(&self, name: &str, callback: F)
    where
        F: Fn(Vec<JsValue>) + Send + Sync + 'static,
    {
        let callback: EventCallback = Arc::new(callback);
        self.events.set(name, callback);
    }

    pub fn remove_event_callback(&self, name: &str) {
        self.events.remove(name);
    }

    /// Invoke the handler for `name` on the calling thread. No-op without one.
    pub fn trigger_event(&self, name: &str, params: Vec<JsValue>) {
        self.events.trigger(name, params);
    }

    // Weak values

    /// Park `values` until [`take_values`](Self::take_values) is called with the token.
    pub fn store_values(&self, values: &[JsValue]) -> Result<WeakValuesId> {
        if values
            .iter()
            .any(|v| !std::ptr::eq(Arc::as_ptr(v.engine()), self))
        {
            return Err(Error::Argument(
                "value belongs to a different engine".to_string(),
            ));
        }

        // Cloning a global touches the isolate's handle table
        let _guard = self.lock();
        let globals = values.iter().map(|v| v.global().clone()).collect();

        Ok(self.weak_values.store(globals))
    }

    /// Retrieve a parked group, consuming its token.
    ///
    /// A token issued by another engine comes back in
    /// [`Error::ForeignToken`]; its values stay parked in that engine.
    pub fn take_values(self: &Arc<Self>, id: WeakValuesId) -> Result<Vec<JsValue>> {
        let globals = self.weak_values.take(id)?;

        Ok(globals
            .into_iter()
            .map(|global| JsValue::from_global(self, global))
            .collect())
    }

    /// Number of value groups currently parked by pending operations.
    pub fn parked_value_groups(&self) -> usize {
        self.weak_values.len()
    }

    // Timers

    /// Call `callback` with `args` after `delay`, unless the engine is gone by then.
    pub fn schedule_delayed(
        self: &Arc<Self>,
        delay: Duration,
        callback: &JsValue,
        args: &[JsValue],
    ) -> Result<()> {
        if !callback.is_function() {
            return Err(Error::Type(
                "Attempting to schedule a non-function".to_string(),
            ));
        }

        let mut values = Vec::with_capacity(args.len() + 2);
        values.push(callback.clone());
        values.push(self.new_value(i64::try_from(delay.as_millis()).unwrap_or(i64::MAX))?);
        values.extend_from_slice(args);

        let id = self.store_values(&values)?;
        let engine = Arc::downgrade(self);

        self.host.timer().set_timer(
            delay,
            Box::new(move || {
                let Some(engine) = engine.upgrade() else {
                    tracing::trace!("Timer fired after engine teardown, dropping");
                    return;
                };

                engine.call_timer_task(id);
            }),
        );

        Ok(())
    }

    fn call_timer_task(self: &Arc<Self>, id: WeakValuesId) {
        let _guard = self.lock();

        let mut params = match self.take_values(id) {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!("Timer task values unavailable: {}", e);
                return;
            }
        };

        if params.len() < 2 {
            return;
        }

        // Drop the callback and delay slots
        let callback = params.remove(0);
        params.remove(0);

        if let Err(e) = callback.call(&params) {
            tracing::warn!("Uncaught exception in timer callback: {}", e);
        }
    }

    // Isolate maintenance

    /// Tell V8 the process is under memory pressure.
    pub fn notify_low_memory(&self) {
        let mut guard = self.lock();
        guard.isolate_mut().low_memory_notification();
    }

    /// Collect garbage until a full collection frees nothing more.
    ///
    /// Returns the used heap size afterwards, in bytes.
    pub fn gc(&self) -> usize {
        const MAX_ROUNDS: usize = 8;

        let mut guard = self.lock();
        let isolate = guard.isolate_mut();
        let mut used = isolate.get_heap_statistics().used_heap_size();

        for round in 1..=MAX_ROUNDS {
            isolate.low_memory_notification();
            let now = isolate.get_heap_statistics().used_heap_size();

            if now >= used {
                tracing::trace!("gc settled after {} round(s) at {} bytes", round, now);
                return now;
            }
            used = now;
        }

        used
    }

    /// Write a heap snapshot to `<path>.heapsnapshot`.
    pub fn write_heap_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file_name = path.as_ref().as_os_str().to_owned();
        file_name.push(".heapsnapshot");

        let mut output = std::io::BufWriter::new(std::fs::File::create(&file_name)?);
        let mut write_error = None;

        {
            let mut guard = self.lock();
            guard.isolate_mut().take_heap_snapshot(|chunk| match output.write_all(chunk) {
                Ok(()) => true,
                Err(e) => {
                    write_error = Some(e);
                    false
                }
            });
        }

        if let Some(e) = write_error {
            return Err(e.into());
        }

        output.flush()?;
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let ids = std::mem::take(self.callback_ids.get_mut());
        callbacks::unregister(ids);

        drop(self.events.take_all());

        // SAFETY: the context is not accessed again; `with_scope` is never
        // called on a guard created below.
        let context = unsafe { ManuallyDrop::take(&mut self.context) };

        {
            let _guard = ContextGuard::acquire(self);
            let released = self.weak_values.clear();
            self.deferred.process_all();
            drop(context);

            tracing::debug!("Engine torn down ({} parked value groups released)", released);
        }

        crate::platform::engine_destroyed();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("app_info", &self.app_info)
            .field("deferred", &self.deferred)
            .field("weak_values", &self.weak_values.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    app_info: AppInfo,
    limits: EngineLimits,
    host: Option<Arc<HostPlatform>>,
    isolate_provider: Option<Box<dyn IsolateProvider>>,
}

impl EngineBuilder {
    pub fn app_info(mut self, app_info: AppInfo) -> Self {
        self.app_info = app_info;
        self
    }

    pub fn limits(mut self, limits: EngineLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Host providers; a default [`HostPlatform`] is created when unset.
    pub fn host(mut self, host: Arc<HostPlatform>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn isolate_provider(mut self, provider: impl IsolateProvider + 'static) -> Self {
        self.isolate_provider = Some(Box::new(provider));
        self
    }

    pub fn build(self) -> Result<Arc<Engine>> {
        let host = match self.host {
            Some(host) => host,
            None => HostPlatform::new()?,
        };

        let provider = self
            .isolate_provider
            .unwrap_or_else(|| Box::new(DefaultIsolateProvider));
        let isolate = LockerManagedIsolate::new(provider.create_isolate(&self.limits)?);

        let context = {
            let (_exclusive, mut locker) = isolate.lock();
            let scope = pin!(v8::HandleScope::new(&mut *locker));
            let scope = scope.init();
            let context = v8::Context::new(&scope, Default::default());
            v8::Global::new(&scope, context)
        };

        let engine = Arc::new_cyclic(|self_ref| Engine {
            self_ref: self_ref.clone(),
            app_info: self.app_info,
            host,
            events: EventCallbacks::default(),
            weak_values: WeakValueRegistry::new(),
            deferred: DeferredDestructionQueue::new(),
            callback_ids: Mutex::new(Vec::new()),
            context: ManuallyDrop::new(SendGlobal(context)),
            isolate,
        });

        crate::platform::engine_created();

        crate::runtime::setup_globals(&engine)?;

        tracing::debug!("Engine created (app: '{}')", engine.app_info.name);

        Ok(engine)
    }
}
