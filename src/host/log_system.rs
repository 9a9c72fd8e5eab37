//! Sink for script console output.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Level code used by the console bindings.
    pub(crate) fn from_code(code: i64) -> Self {
        match code {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            4 => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };

        f.write_str(name)
    }
}

pub trait LogSystem: Send + Sync {
    /// `source` is the `file:line` of the calling script, or empty.
    fn log(&self, level: LogLevel, message: &str, source: &str);
}

/// Forwards console output to `tracing` under the `jsengine::console` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLogSystem;

impl LogSystem for DefaultLogSystem {
    fn log(&self, level: LogLevel, message: &str, source: &str) {
        match level {
            LogLevel::Error => tracing::error!(target: "jsengine::console", source, "{}", message),
            LogLevel::Warn => tracing::warn!(target: "jsengine::console", source, "{}", message),
            LogLevel::Info => tracing::info!(target: "jsengine::console", source, "{}", message),
            LogLevel::Debug => tracing::debug!(target: "jsengine::console", source, "{}", message),
            LogLevel::Trace => tracing::trace!(target: "jsengine::console", source, "{}", message),
        }
    }
}
