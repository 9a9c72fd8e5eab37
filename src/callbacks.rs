//! Script-to-native dispatch.
//!
//! Script functions created by [`Engine::new_callback`] all share one native
//! trampoline. Their `data` slot carries a numeric id; a process-wide table
//! maps the id to the owning engine (held weakly) and the native function.
//! Entries are removed when the engine is dropped, so nothing is leaked per
//! function object.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Weak};

use parking_lot::RwLock;

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::value::{JsValue, ToJs};

/// Native implementation behind a script-callable function.
///
/// Returning `Ok(None)` yields `undefined`. `Err(Error::Argument | Error::Type)`
/// is thrown into script as a `TypeError`, any other error as an `Error`.
pub type NativeFunction =
    Arc<dyn Fn(&Arc<Engine>, Vec<JsValue>) -> Result<Option<JsValue>> + Send + Sync>;

struct Registration {
    engine: Weak<Engine>,
    function: NativeFunction,
}

static REGISTRY: LazyLock<RwLock<HashMap<u64, Registration>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

static NEXT_CALLBACK_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn register(engine: &Arc<Engine>, function: NativeFunction) -> u64 {
    let id = NEXT_CALLBACK_ID.fetch_add(1, Ordering::Relaxed);

    REGISTRY.write().insert(
        id,
        Registration {
            engine: Arc::downgrade(engine),
            function,
        },
    );

    id
}

pub(crate) fn unregister(ids: impl IntoIterator<Item = u64>) {
    let mut registry = REGISTRY.write();

    for id in ids {
        registry.remove(&id);
    }
}

fn lookup(id: u64) -> Result<(Arc<Engine>, NativeFunction)> {
    let registry = REGISTRY.read();
    let registration = registry.get(&id).ok_or(Error::EngineGone)?;
    let engine = registration.engine.upgrade().ok_or(Error::EngineGone)?;

    Ok((engine, registration.function.clone()))
}

/// Create the script function object for a registered callback id.
pub(crate) fn create_function<'s>(
    scope: &mut v8::PinScope<'s, '_>,
    id: u64,
) -> Result<v8::Local<'s, v8::Function>> {
    let data = v8::Number::new(scope, id as f64);

    v8::Function::builder(dispatch_native)
        .data(data.into())
        .build(scope)
        .ok_or_else(|| Error::Type("unable to create native function".to_string()))
}

fn dispatch_native(
    scope: &mut v8::PinScope,
    args: v8::FunctionCallbackArguments,
    mut rv: v8::ReturnValue,
) {
    let id = v8::Local::<v8::Number>::try_from(args.data())
        .map(|n| n.value() as u64)
        .unwrap_or(0);

    let (engine, function) = match lookup(id) {
        Ok(found) => found,
        Err(e) => {
            tracing::error!("Native callback {} invoked without a live engine", id);
            throw_error(scope, &e);
            return;
        }
    };

    let params = convert_arguments(&engine, scope, &args);

    let result = function(&engine, params)
        .and_then(|value| value.map(|v| v.to_js(&engine, scope)).transpose());

    match result {
        Ok(Some(value)) => rv.set(value),
        Ok(None) => {}
        Err(e) => throw_error(scope, &e),
    }
}

/// Snapshot every argument of a native call into a [`JsValue`].
pub(crate) fn convert_arguments(
    engine: &Arc<Engine>,
    scope: &mut v8::PinScope,
    args: &v8::FunctionCallbackArguments,
) -> Vec<JsValue> {
    (0..args.length())
        .map(|i| JsValue::from_local(engine, scope, args.get(i)))
        .collect()
}

/// Throw `error` into the running script.
pub(crate) fn throw_error(scope: &mut v8::PinScope, error: &Error) {
    let message = v8::String::new(scope, &error.to_string())
        .unwrap_or_else(|| v8::String::empty(scope));

    let exception = match error {
        Error::Argument(_) | Error::Type(_) => v8::Exception::type_error(scope, message),
        _ => v8::Exception::error(scope, message),
    };

    scope.throw_exception(exception);
}

/// Fail with `"<name> requires <count> parameters"` unless exactly `count` were passed.
pub(crate) fn require_arity(params: &[JsValue], count: usize, name: &str) -> Result<()> {
    if params.len() != count {
        let noun = if count == 1 { "parameter" } else { "parameters" };
        return Err(Error::Argument(format!("{} requires {} {}", name, count, noun)));
    }

    Ok(())
}

/// Fail with `"<ordinal> argument to <name> must be a function"`.
pub(crate) fn require_function(params: &[JsValue], index: usize, name: &str) -> Result<()> {
    if params.get(index).is_some_and(JsValue::is_function) {
        return Ok(());
    }

    Err(Error::Argument(format!(
        "{} argument to {} must be a function",
        ordinal(index),
        name
    )))
}

fn ordinal(index: usize) -> &'static str {
    match index {
        0 => "First",
        1 => "Second",
        2 => "Third",
        _ => "Last",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals() {
        assert_eq!(ordinal(0), "First");
        assert_eq!(ordinal(1), "Second");
        assert_eq!(ordinal(2), "Third");
    }

    #[test]
    fn test_require_arity_message() {
        let err = require_arity(&[], 2, "_fileSystem.read").unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
        assert_eq!(err.to_string(), "_fileSystem.read requires 2 parameters");

        let err = require_arity(&[], 1, "_fileSystem.resolve").unwrap_err();
        assert_eq!(err.to_string(), "_fileSystem.resolve requires 1 parameter");
    }

    #[test]
    fn test_require_function_on_missing_argument() {
        let err = require_function(&[], 1, "_fileSystem.stat").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Second argument to _fileSystem.stat must be a function"
        );
    }

    #[test]
    fn test_unknown_id_reports_engine_gone() {
        unregister([u64::MAX]);
        assert!(matches!(lookup(u64::MAX), Err(Error::EngineGone)));
    }
}
