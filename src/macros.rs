//! Crate-internal macros for working with V8 scopes.

/// Create a V8 string, mapping allocation failure to `Error::Type`.
macro_rules! v8_str {
    ($scope:expr, $value:expr) => {{
        let value: &str = $value;
        v8::String::new($scope, value).ok_or_else(|| {
            $crate::error::Error::Type(format!(
                "unable to create a script string of {} bytes",
                value.len()
            ))
        })
    }};
}

/// Build a `ScriptError` from the exception caught by an initialised `v8::TryCatch`.
macro_rules! capture_exception {
    ($tc:expr) => {{
        let tc = &$tc;

        let message = tc
            .exception()
            .and_then(|e| e.to_string(tc))
            .map(|s| s.to_rust_string_lossy(tc))
            .unwrap_or_else(|| "Unknown script error".to_string());

        let stack = tc
            .stack_trace()
            .filter(|s| !s.is_undefined() && !s.is_null())
            .and_then(|s| s.to_string(tc))
            .map(|s| s.to_rust_string_lossy(tc))
            .filter(|s| !s.is_empty());

        let location = tc.message().map(|m| {
            let resource = m
                .get_script_resource_name(tc)
                .filter(|r| !r.is_undefined())
                .and_then(|r| r.to_string(tc))
                .map(|s| s.to_rust_string_lossy(tc))
                .unwrap_or_default();

            format!("{}:{}", resource, m.get_line_number(tc).unwrap_or(0))
        });

        $crate::error::ScriptError {
            message,
            stack,
            location,
        }
    }};
}
