//! Common macros for script bindings.
//!
//! These macros help reduce boilerplate when exposing native functions to
//! script. They expand inside functions returning `crate::error::Result`.

/// Register a native function on the global object.
///
/// # Example
/// ```ignore
/// register_fn!(engine, "_triggerEvent", trigger_event);
/// ```
macro_rules! register_fn {
    ($engine:expr, $name:literal, $func:expr) => {{
        let function = $engine.new_callback($func)?;
        $engine.set_global_property($name, &function)?;
    }};
}

/// Attach a native function as a property of an existing object.
///
/// # Example
/// ```ignore
/// register_method!(engine, fs_object, "read", read);
/// ```
macro_rules! register_method {
    ($engine:expr, $object:expr, $name:literal, $func:expr) => {{
        let function = $engine.new_callback($func)?;
        $object.set_property($name, &function)?;
    }};
}

/// Execute setup script code in the engine's context.
///
/// # Example
/// ```ignore
/// exec_js!(engine, "console.js", r#"globalThis.console = { ... };"#);
/// ```
macro_rules! exec_js {
    ($engine:expr, $label:literal, $code:expr) => {{
        $engine.evaluate($code, Some(concat!("jsengine:", $label)))?;
    }};
}
