use std::sync::Arc;

use crate::engine::Engine;
use crate::error::Result;
use crate::host::LogLevel;
use crate::value::JsValue;

/// Native console log function
/// Args: level (i32), message (String), source (String)
fn console_log(engine: &Arc<Engine>, params: Vec<JsValue>) -> Result<Option<JsValue>> {
    let level = params.first().map(JsValue::as_int).unwrap_or(2);
    let message = params.get(1).map(JsValue::as_string).unwrap_or_default();
    let source = params.get(2).map(JsValue::as_string).unwrap_or_default();

    engine
        .log_system()
        .log(LogLevel::from_code(level), &message, &source);

    Ok(None)
}

pub fn setup_console(engine: &Arc<Engine>) -> Result<()> {
    register_fn!(engine, "__console_log", console_log);

    // Setup console object using JS that calls __console_log
    exec_js!(
        engine,
        "console.js",
        r#"
        function __formatArg(a) {
            if (a instanceof Error) {
                return a.stack || (a.name + ': ' + a.message);
            }

            if (typeof a === 'object' && a !== null) {
                try {
                    return JSON.stringify(a);
                } catch (e) {
                    return String(a);
                }
            }

            return String(a);
        }

        function __callerSource() {
            // [0] message, [1] __callerSource, [2] __log, [3] console method, [4] caller
            const frame = (new Error().stack || '').split('\n')[4] || '';
            const match = frame.match(/\(?([^()\s]+:\d+):\d+\)?$/);
            return match ? match[1] : '';
        }

        function __log(level, args) {
            __console_log(level, args.map(__formatArg).join(' '), __callerSource());
        }

        globalThis.console = {
            log: function(...args) {
                __log(2, args);
            },
            info: function(...args) {
                __log(2, args);
            },
            warn: function(...args) {
                __log(1, args);
            },
            error: function(...args) {
                __log(0, args);
            },
            debug: function(...args) {
                __log(3, args);
            },
            trace: function(...args) {
                __log(4, args);
            }
        };
    "#
    );

    Ok(())
}
