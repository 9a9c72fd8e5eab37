//! Host-side handles to script values.
//!
//! A [`JsValue`] owns a `v8::Global` plus a strong reference to its engine, so
//! a handle can never outlive the isolate it points into. Every accessor takes
//! the engine's [`ContextGuard`](crate::ContextGuard); handles can be cloned,
//! sent and dropped from any thread.

use std::fmt;
use std::pin::pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::context_guard::ContextGuard;
use crate::engine::Engine;
use crate::error::{Error, Result};

/// Reference-counted handle to one script value.
#[derive(Clone)]
pub struct JsValue {
    inner: Arc<JsValueInner>,
}

struct JsValueInner {
    engine: Arc<Engine>,
    value: Option<v8::Global<v8::Value>>,
}

// SAFETY: the global is only dereferenced under the engine's context guard, and
// released either under it or through the engine's deferred destruction queue.
unsafe impl Send for JsValueInner {}
unsafe impl Sync for JsValueInner {}

impl Drop for JsValueInner {
    fn drop(&mut self) {
        let Some(global) = self.value.take() else {
            return;
        };

        if ContextGuard::is_held(&self.engine) {
            drop(global);
        } else {
            self.engine.deferred().defer(global);
        }
    }
}

impl JsValue {
    /// Wrap a local handle. The caller holds the engine's context guard.
    pub(crate) fn from_local(
        engine: &Arc<Engine>,
        scope: &v8::PinScope<'_, '_>,
        value: v8::Local<'_, v8::Value>,
    ) -> Self {
        Self::from_global(engine, v8::Global::new(scope, value))
    }

    pub(crate) fn from_global(engine: &Arc<Engine>, value: v8::Global<v8::Value>) -> Self {
        Self {
            inner: Arc::new(JsValueInner {
                engine: engine.clone(),
                value: Some(value),
            }),
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.inner.engine
    }

    pub(crate) fn global(&self) -> &v8::Global<v8::Value> {
        // Only `Drop` takes the value out
        self.inner
            .value
            .as_ref()
            .unwrap_or_else(|| unreachable!("JsValue used after release"))
    }

    pub(crate) fn local<'s>(&self, scope: &v8::PinScope<'s, '_>) -> v8::Local<'s, v8::Value> {
        v8::Local::new(scope, self.global())
    }

    /// Whether both handles refer to the same script value.
    pub fn is_same(&self, other: &JsValue) -> bool {
        if !Arc::ptr_eq(&self.inner.engine, &other.inner.engine) {
            return false;
        }

        self.with_local(|scope, value| value.strict_equals(other.local(scope)))
    }

    fn with_local<R>(
        &self,
        f: impl for<'s, 'i> FnOnce(&mut v8::PinScope<'s, 'i>, v8::Local<'s, v8::Value>) -> R,
    ) -> R {
        let guard = self.inner.engine.lock();

        guard.with_scope(|scope| {
            let value = self.local(scope);
            f(scope, value)
        })
    }

    // Type predicates

    pub fn is_undefined(&self) -> bool {
        self.with_local(|_, v| v.is_undefined())
    }

    pub fn is_null(&self) -> bool {
        self.with_local(|_, v| v.is_null())
    }

    pub fn is_string(&self) -> bool {
        self.with_local(|_, v| v.is_string() || v.is_string_object())
    }

    pub fn is_number(&self) -> bool {
        self.with_local(|_, v| v.is_number() || v.is_number_object())
    }

    pub fn is_bool(&self) -> bool {
        self.with_local(|_, v| v.is_boolean() || v.is_boolean_object())
    }

    pub fn is_object(&self) -> bool {
        self.with_local(|_, v| v.is_object())
    }

    pub fn is_array(&self) -> bool {
        self.with_local(|_, v| v.is_array())
    }

    pub fn is_function(&self) -> bool {
        self.with_local(|_, v| v.is_function())
    }

    // Coercions

    /// String conversion as performed by `String(value)`.
    ///
    /// Values whose conversion throws (symbols, objects with a throwing
    /// `toString`) yield an empty string.
    pub fn as_string(&self) -> String {
        self.with_local(|scope, value| {
            let tc = pin!(v8::TryCatch::new(scope));
            let tc = tc.init();

            value
                .to_string(&tc)
                .map(|s| s.to_rust_string_lossy(&tc))
                .unwrap_or_default()
        })
    }

    /// Integer conversion, truncating toward zero. `NaN` yields `0`.
    pub fn as_int(&self) -> i64 {
        self.with_local(|scope, value| {
            let tc = pin!(v8::TryCatch::new(scope));
            let tc = tc.init();

            value.integer_value(&tc).unwrap_or(0)
        })
    }

    pub fn as_bool(&self) -> bool {
        self.with_local(|scope, value| value.boolean_value(scope))
    }

    /// Snapshot of the elements of an array, in index order.
    pub fn as_list(&self) -> Result<Vec<JsValue>> {
        let engine = self.engine();

        self.with_local(|scope, value| {
            let array: v8::Local<v8::Array> = value
                .try_into()
                .map_err(|_| Error::Type("Cannot convert a non-array to list".to_string()))?;

            let mut items = Vec::with_capacity(array.length() as usize);

            for i in 0..array.length() {
                let item = array
                    .get_index(scope, i)
                    .unwrap_or_else(|| v8::undefined(scope).into());
                items.push(JsValue::from_local(engine, scope, item));
            }

            Ok(items)
        })
    }

    /// Contents of an `ArrayBuffer` or any `ArrayBufferView` (typed array, `DataView`).
    pub fn as_bytes(&self) -> Result<Bytes> {
        self.with_local(|_, value| {
            if let Ok(view) = v8::Local::<v8::ArrayBufferView>::try_from(value) {
                let mut data = vec![0u8; view.byte_length()];
                let copied = view.copy_contents(&mut data);
                data.truncate(copied);
                return Ok(Bytes::from(data));
            }

            if let Ok(buffer) = v8::Local::<v8::ArrayBuffer>::try_from(value) {
                let store = buffer.get_backing_store();
                let len = store.byte_length();

                let data = match store.data() {
                    // SAFETY: the backing store is kept alive by `store` and
                    // holds `len` initialised bytes.
                    Some(ptr) if len > 0 => unsafe {
                        std::slice::from_raw_parts(ptr.as_ptr() as *const u8, len).to_vec()
                    },
                    _ => Vec::new(),
                };

                return Ok(Bytes::from(data));
            }

            Err(Error::Type(
                "Cannot convert a non-buffer value to bytes".to_string(),
            ))
        })
    }

    // Object access

    pub fn own_property_names(&self) -> Result<Vec<String>> {
        self.with_local(|scope, value| {
            let object = as_object(value, "Attempting to get property list for a non-object")?;

            let Some(names) = object.get_own_property_names(scope, Default::default()) else {
                return Ok(Vec::new());
            };

            let mut result = Vec::with_capacity(names.length() as usize);

            for i in 0..names.length() {
                if let Some(name) = names.get_index(scope, i) {
                    result.push(name.to_rust_string_lossy(scope));
                }
            }

            Ok(result)
        })
    }

    /// Read a property. Missing properties yield `undefined`.
    pub fn get_property(&self, name: &str) -> Result<JsValue> {
        let engine = self.engine();

        self.with_local(|scope, value| {
            let object = as_object(value, "Attempting to get property of a non-object")?;
            let key = v8_str!(scope, name)?;

            let tc = pin!(v8::TryCatch::new(scope));
            let tc = tc.init();

            match object.get(&tc, key.into()) {
                Some(result) => Ok(JsValue::from_local(engine, &tc, result)),
                None => Err(capture_exception!(tc).into()),
            }
        })
    }

    pub fn set_property(&self, name: &str, value: impl ToJs) -> Result<()> {
        let engine = self.engine();

        self.with_local(|scope, target| {
            let object = as_object(target, "Attempting to set property on a non-object")?;
            let key = v8_str!(scope, name)?;
            let value = value.to_js(engine, scope)?;

            let tc = pin!(v8::TryCatch::new(scope));
            let tc = tc.init();

            match object.set(&tc, key.into(), value) {
                Some(_) => Ok(()),
                None => Err(capture_exception!(tc).into()),
            }
        })
    }

    /// Name of the object's constructor, e.g. `"Object"` or `"Uint8Array"`.
    pub fn class_name(&self) -> Result<String> {
        self.with_local(|scope, value| {
            let object = as_object(value, "Cannot get constructor name of a non-object")?;
            Ok(object.get_constructor_name().to_rust_string_lossy(scope))
        })
    }

    // Invocation

    /// Call this function with the global object as receiver.
    pub fn call(&self, args: &[JsValue]) -> Result<JsValue> {
        self.call_inner(args, None)
    }

    pub fn call_with_this(&self, args: &[JsValue], this: &JsValue) -> Result<JsValue> {
        self.call_inner(args, Some(this))
    }

    fn call_inner(&self, args: &[JsValue], this: Option<&JsValue>) -> Result<JsValue> {
        if !self.is_function() {
            return Err(Error::Type("Attempting to call a non-function".to_string()));
        }

        if let Some(this) = this
            && !this.is_object()
        {
            return Err(Error::Type(
                "`this` pointer has to be an object".to_string(),
            ));
        }

        let engine = self.engine();

        self.with_local(|scope, value| {
            let function: v8::Local<v8::Function> = value
                .try_into()
                .map_err(|_| Error::Type("Attempting to call a non-function".to_string()))?;

            let receiver: v8::Local<v8::Value> = match this {
                Some(this) => this.to_js(engine, scope)?,
                None => scope.get_current_context().global(scope).into(),
            };

            let argv = args
                .iter()
                .map(|arg| arg.to_js(engine, scope))
                .collect::<Result<Vec<_>>>()?;

            let tc = pin!(v8::TryCatch::new(scope));
            let tc = tc.init();

            match function.call(&tc, receiver, &argv) {
                Some(result) => Ok(JsValue::from_local(engine, &tc, result)),
                None => Err(capture_exception!(tc).into()),
            }
        })
    }
}

fn as_object<'s>(value: v8::Local<'s, v8::Value>, message: &str) -> Result<v8::Local<'s, v8::Object>> {
    value
        .try_into()
        .map_err(|_| Error::Type(message.to_string()))
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsValue").finish_non_exhaustive()
    }
}

/// Conversion of host data into a script value.
///
/// Implemented for strings, numbers, booleans, string lists, byte buffers and
/// existing [`JsValue`]s. Conversions run under the engine's context guard.
pub trait ToJs {
    fn to_js<'s>(
        &self,
        engine: &Arc<Engine>,
        scope: &mut v8::PinScope<'s, '_>,
    ) -> Result<v8::Local<'s, v8::Value>>;
}

impl<T: ToJs + ?Sized> ToJs for &T {
    fn to_js<'s>(
        &self,
        engine: &Arc<Engine>,
        scope: &mut v8::PinScope<'s, '_>,
    ) -> Result<v8::Local<'s, v8::Value>> {
        (**self).to_js(engine, scope)
    }
}

impl ToJs for JsValue {
    fn to_js<'s>(
        &self,
        engine: &Arc<Engine>,
        scope: &mut v8::PinScope<'s, '_>,
    ) -> Result<v8::Local<'s, v8::Value>> {
        if !Arc::ptr_eq(&self.inner.engine, engine) {
            return Err(Error::Argument(
                "value belongs to a different engine".to_string(),
            ));
        }

        Ok(self.local(scope))
    }
}

impl ToJs for str {
    fn to_js<'s>(
        &self,
        _engine: &Arc<Engine>,
        scope: &mut v8::PinScope<'s, '_>,
    ) -> Result<v8::Local<'s, v8::Value>> {
        Ok(v8_str!(scope, self)?.into())
    }
}

impl ToJs for String {
    fn to_js<'s>(
        &self,
        engine: &Arc<Engine>,
        scope: &mut v8::PinScope<'s, '_>,
    ) -> Result<v8::Local<'s, v8::Value>> {
        self.as_str().to_js(engine, scope)
    }
}

impl ToJs for i64 {
    fn to_js<'s>(
        &self,
        _engine: &Arc<Engine>,
        scope: &mut v8::PinScope<'s, '_>,
    ) -> Result<v8::Local<'s, v8::Value>> {
        Ok(v8::Number::new(scope, *self as f64).into())
    }
}

impl ToJs for i32 {
    fn to_js<'s>(
        &self,
        _engine: &Arc<Engine>,
        scope: &mut v8::PinScope<'s, '_>,
    ) -> Result<v8::Local<'s, v8::Value>> {
        Ok(v8::Integer::new(scope, *self).into())
    }
}

impl ToJs for u32 {
    fn to_js<'s>(
        &self,
        _engine: &Arc<Engine>,
        scope: &mut v8::PinScope<'s, '_>,
    ) -> Result<v8::Local<'s, v8::Value>> {
        Ok(v8::Integer::new_from_unsigned(scope, *self).into())
    }
}

impl ToJs for f64 {
    fn to_js<'s>(
        &self,
        _engine: &Arc<Engine>,
        scope: &mut v8::PinScope<'s, '_>,
    ) -> Result<v8::Local<'s, v8::Value>> {
        Ok(v8::Number::new(scope, *self).into())
    }
}

impl ToJs for bool {
    fn to_js<'s>(
        &self,
        _engine: &Arc<Engine>,
        scope: &mut v8::PinScope<'s, '_>,
    ) -> Result<v8::Local<'s, v8::Value>> {
        Ok(v8::Boolean::new(scope, *self).into())
    }
}

fn string_array<'s, S: AsRef<str>>(
    scope: &mut v8::PinScope<'s, '_>,
    items: &[S],
) -> Result<v8::Local<'s, v8::Value>> {
    let array = v8::Array::new(scope, crate::v8_helpers::array_length(items.len())?);

    for (i, item) in items.iter().enumerate() {
        let item = v8_str!(scope, item.as_ref())?;
        array.set_index(scope, i as u32, item.into());
    }

    Ok(array.into())
}

impl ToJs for [String] {
    fn to_js<'s>(
        &self,
        _engine: &Arc<Engine>,
        scope: &mut v8::PinScope<'s, '_>,
    ) -> Result<v8::Local<'s, v8::Value>> {
        string_array(scope, self)
    }
}

impl ToJs for Vec<String> {
    fn to_js<'s>(
        &self,
        _engine: &Arc<Engine>,
        scope: &mut v8::PinScope<'s, '_>,
    ) -> Result<v8::Local<'s, v8::Value>> {
        string_array(scope, self)
    }
}

impl ToJs for [&str] {
    fn to_js<'s>(
        &self,
        _engine: &Arc<Engine>,
        scope: &mut v8::PinScope<'s, '_>,
    ) -> Result<v8::Local<'s, v8::Value>> {
        string_array(scope, self)
    }
}

impl ToJs for Vec<&str> {
    fn to_js<'s>(
        &self,
        _engine: &Arc<Engine>,
        scope: &mut v8::PinScope<'s, '_>,
    ) -> Result<v8::Local<'s, v8::Value>> {
        string_array(scope, self)
    }
}

/// Byte buffers become a `Uint8Array`.
impl ToJs for Bytes {
    fn to_js<'s>(
        &self,
        _engine: &Arc<Engine>,
        scope: &mut v8::PinScope<'s, '_>,
    ) -> Result<v8::Local<'s, v8::Value>> {
        crate::v8_helpers::create_uint8_array(scope, self.to_vec())
    }
}

impl ToJs for Vec<u8> {
    fn to_js<'s>(
        &self,
        _engine: &Arc<Engine>,
        scope: &mut v8::PinScope<'s, '_>,
    ) -> Result<v8::Local<'s, v8::Value>> {
        crate::v8_helpers::create_uint8_array(scope, self.clone())
    }
}
